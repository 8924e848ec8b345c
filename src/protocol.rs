//! Wire protocol for the persistent channel.
//!
//! Outbound traffic is either a correlated request (`{id, method, params}`)
//! or a fire-and-forget control frame (`{type, payload}`). Inbound traffic
//! is either a response correlated by `id` or a broadcast tagged by `type`.
//! Every known broadcast tag decodes into a typed variant; an unrecognized
//! tag is a decode error at the channel edge, not an untyped value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Balance, MarketAnalysis, Session, SessionId, Trade};

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// A broadcast topic, optionally scoped to an entity.
///
/// Serializes as the control-frame payload, e.g.
/// `{"channel": "trades", "session_id": "sess-1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Topic {
    /// All session lifecycle updates.
    Sessions,
    /// Trades executed within one session.
    Trades { session_id: SessionId },
    /// Periodic analysis results for one symbol.
    MarketAnalysis { symbol: String },
}

impl Topic {
    /// Composite key identifying this subscription in the registry.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Sessions => "sessions".into(),
            Self::Trades { session_id } => format!("trades_{session_id}"),
            Self::MarketAnalysis { symbol } => format!("market_analysis_{symbol}"),
        }
    }

    /// The inbound `type` tag under which this topic's broadcasts arrive.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Trades { .. } => "trade",
            Self::MarketAnalysis { .. } => "market_analysis",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

/// Subscribe/unsubscribe verb of a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Subscribe,
    Unsubscribe,
}

/// Fire-and-forget control frame: `{"type": "subscribe", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    pub payload: Topic,
}

/// Any frame the client writes to the channel.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// Correlated request; the server must echo `id` in its response.
    Request {
        id: String,
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Control(ControlFrame),
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// Response to a correlated request.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// Convert into the result delivered to the waiting caller.
    ///
    /// `method` is carried from the pending entry so rejections name the
    /// operation, not just the opaque request id.
    pub fn into_result(self, method: &str) -> crate::error::Result<Value> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(crate::error::Error::ServerRejected {
                method: method.into(),
                message: self
                    .error
                    .unwrap_or_else(|| "no error message provided".into()),
            })
        }
    }
}

/// Server-push broadcast, tagged by topic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Broadcast {
    Sessions(Vec<Session>),
    Trade(Trade),
    MarketAnalysis(MarketAnalysis),
    Balance(Balance),
}

impl Broadcast {
    /// The `type` tag this broadcast arrived under; listeners key on it.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Sessions(_) => "sessions",
            Self::Trade(_) => "trade",
            Self::MarketAnalysis(_) => "market_analysis",
            Self::Balance(_) => "balance",
        }
    }
}

/// Any frame the client reads from the channel.
///
/// A frame carrying an `id` is a response; everything else must be a known
/// broadcast. Untagged decoding tries responses first, so a broadcast can
/// never shadow a pending request.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Response(Response),
    Broadcast(Broadcast),
}

// ---------------------------------------------------------------------------
// Payload normalization
// ---------------------------------------------------------------------------

/// Batch-analysis result, tolerant of both transports' serializations: the
/// channel path sends a bare array, the stateless path wraps it in an
/// `analyses` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AnalysisBatch {
    Flat(Vec<MarketAnalysis>),
    Wrapped { analyses: Vec<MarketAnalysis> },
}

impl AnalysisBatch {
    /// The normalized shape handed to callers.
    #[must_use]
    pub fn into_vec(self) -> Vec<MarketAnalysis> {
        match self {
            Self::Flat(analyses) | Self::Wrapped { analyses } => analyses,
        }
    }
}

/// Open-position count, tolerant of a bare number and a `{count: n}` object.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum PositionCount {
    Plain(u64),
    Wrapped { count: u64 },
}

impl PositionCount {
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::Plain(count) | Self::Wrapped { count } => count,
        }
    }
}

/// Risk-check toggle acknowledgment, tolerant of a bare boolean and an
/// `{enabled: b}` object.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum RiskChecksState {
    Plain(bool),
    Wrapped { enabled: bool },
}

impl RiskChecksState {
    #[must_use]
    pub const fn enabled(self) -> bool {
        match self {
            Self::Plain(enabled) | Self::Wrapped { enabled } => enabled,
        }
    }
}
