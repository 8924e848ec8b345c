//! Stateless fallback port.
//!
//! One method per logical operation of the service's HTTP surface. The
//! dispatcher calls these when the channel path is unavailable; results are
//! shape-identical to the channel path's decoded payloads.

use async_trait::async_trait;

use crate::domain::{
    Balance, MarketAnalysis, OpenSessionRequest, ServerInfo, Session, SessionId, Trade,
};
use crate::error::Error;

/// The service's stateless request/response surface.
#[async_trait]
pub trait FallbackApi: Send + Sync {
    /// List all sessions.
    async fn sessions(&self) -> Result<Vec<Session>, Error>;

    /// Fetch one session by id.
    async fn session(&self, id: &SessionId) -> Result<Session, Error>;

    /// List trades executed within a session.
    async fn session_trades(&self, id: &SessionId) -> Result<Vec<Trade>, Error>;

    /// Fetch the latest analysis for one symbol.
    async fn market_analysis(&self, symbol: &str) -> Result<MarketAnalysis, Error>;

    /// Fetch analyses for a batch of symbols.
    async fn market_analysis_batch(&self, symbols: &[String])
        -> Result<Vec<MarketAnalysis>, Error>;

    /// Fetch the aggregate balance.
    async fn balance(&self) -> Result<Balance, Error>;

    /// Open a new trading session.
    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session, Error>;

    /// Close a session; returns its final state.
    async fn close_session(&self, id: &SessionId) -> Result<Session, Error>;

    /// Start the server-side periodic analysis loop.
    async fn start_analysis(&self, interval_ms: Option<u64>) -> Result<(), Error>;

    /// Stop the server-side periodic analysis loop.
    async fn stop_analysis(&self) -> Result<(), Error>;

    /// Adjust the periodic analysis interval.
    async fn set_analysis_interval(&self, interval_ms: u64) -> Result<(), Error>;

    /// Enable or disable server-side risk checks; returns the new state.
    async fn set_risk_checks(&self, enabled: bool) -> Result<bool, Error>;

    /// Fetch server diagnostic info.
    async fn server_info(&self) -> Result<ServerInfo, Error>;

    /// Count of open positions across all sessions.
    async fn open_position_count(&self) -> Result<u64, Error>;
}
