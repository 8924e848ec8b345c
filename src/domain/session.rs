//! Trading sessions as reported by the remote service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::SessionId;

/// Lifecycle state of a trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is running and may open positions.
    Active,
    /// Session is running but not opening new positions.
    Paused,
    /// Session has been closed; all fields are final.
    Closed,
}

/// A trading session owned by the remote service.
///
/// The service is the source of truth for every field; the client never
/// mutates a session locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Instrument the session trades (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Name of the strategy driving the session.
    pub strategy: String,
    pub status: SessionStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Realized profit and loss in the account currency.
    pub realized_pnl: Decimal,
    /// Number of currently open positions in this session.
    pub open_positions: u32,
}

impl Session {
    /// Whether the session can still trade.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.status, SessionStatus::Closed)
    }
}

/// Parameters for opening a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub symbol: String,
    pub strategy: String,
    /// Capital allocated to the session in the account currency.
    pub stake: Decimal,
}
