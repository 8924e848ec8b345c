//! Aggregate account balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate balance across all sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    /// Total equity including open positions.
    pub total: Decimal,
    /// Amount not locked in open positions or pending orders.
    pub available: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Amount locked in open positions and pending orders.
    #[must_use]
    pub fn locked(&self) -> Decimal {
        self.total - self.available
    }
}
