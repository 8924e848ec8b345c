//! Market analysis results produced by the remote service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Directional signal of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// A single market analysis for one symbol.
///
/// How the service computes this is opaque to the client; the shape is the
/// wire contract only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub symbol: String,
    pub signal: Signal,
    /// Confidence in the signal, 0 to 1.
    pub confidence: Decimal,
    /// Last traded price the analysis was computed from.
    pub last_price: Decimal,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
