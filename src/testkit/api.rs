//! Mock [`FallbackApi`] with scripted results and call recording.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{
    Balance, MarketAnalysis, OpenSessionRequest, ServerInfo, Session, SessionId, Trade,
};
use crate::error::{Error, Result};
use crate::port::FallbackApi;

use super::domain as fixtures;

/// A scripted stateless API.
///
/// Reads return the preset values (fixtures by default); writes echo their
/// input back as the service would. Every call is recorded by operation
/// name so tests can assert which path served a request. Flip
/// [`fail_with_status`](Self::fail_with_status) to make every operation
/// fail, for exercising the surfaced-fallback-error path.
pub struct ScriptedApi {
    sessions: Vec<Session>,
    trades: Vec<Trade>,
    analyses: Vec<MarketAnalysis>,
    balance: Balance,
    server_info: ServerInfo,
    position_count: u64,
    failure: Option<(u16, String)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            sessions: vec![fixtures::session("sess-1")],
            trades: vec![fixtures::trade("t-1", "sess-1")],
            analyses: vec![fixtures::analysis("BTCUSDT")],
            balance: fixtures::balance(),
            server_info: fixtures::server_info(),
            position_count: 3,
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_sessions(mut self, sessions: Vec<Session>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_analyses(mut self, analyses: Vec<MarketAnalysis>) -> Self {
        self.analyses = analyses;
        self
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }

    /// Make every operation fail with the given HTTP status.
    pub fn fail_with_status(mut self, status: u16, message: impl Into<String>) -> Self {
        self.failure = Some((status, message.into()));
        self
    }

    /// Shared recorder of operation names, in call order.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn record(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        match &self.failure {
            Some((status, message)) => Err(Error::FallbackHttp {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackApi for ScriptedApi {
    async fn sessions(&self) -> Result<Vec<Session>> {
        self.record("sessions")?;
        Ok(self.sessions.clone())
    }

    async fn session(&self, id: &SessionId) -> Result<Session> {
        self.record("session")?;
        self.sessions
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| Error::FallbackHttp {
                status: 404,
                message: format!("no session {id}"),
            })
    }

    async fn session_trades(&self, _id: &SessionId) -> Result<Vec<Trade>> {
        self.record("session_trades")?;
        Ok(self.trades.clone())
    }

    async fn market_analysis(&self, symbol: &str) -> Result<MarketAnalysis> {
        self.record("market_analysis")?;
        self.analyses
            .iter()
            .find(|a| a.symbol == symbol)
            .cloned()
            .ok_or_else(|| Error::FallbackHttp {
                status: 404,
                message: format!("no analysis for {symbol}"),
            })
    }

    async fn market_analysis_batch(&self, symbols: &[String]) -> Result<Vec<MarketAnalysis>> {
        self.record("market_analysis_batch")?;
        Ok(self
            .analyses
            .iter()
            .filter(|a| symbols.contains(&a.symbol))
            .cloned()
            .collect())
    }

    async fn balance(&self) -> Result<Balance> {
        self.record("balance")?;
        Ok(self.balance.clone())
    }

    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session> {
        self.record("open_session")?;
        let mut session = fixtures::session("sess-new");
        session.symbol = request.symbol.clone();
        session.strategy = request.strategy.clone();
        Ok(session)
    }

    async fn close_session(&self, id: &SessionId) -> Result<Session> {
        self.record("close_session")?;
        let mut session = fixtures::session(id.as_str());
        session.status = crate::domain::SessionStatus::Closed;
        Ok(session)
    }

    async fn start_analysis(&self, _interval_ms: Option<u64>) -> Result<()> {
        self.record("start_analysis")
    }

    async fn stop_analysis(&self) -> Result<()> {
        self.record("stop_analysis")
    }

    async fn set_analysis_interval(&self, _interval_ms: u64) -> Result<()> {
        self.record("set_analysis_interval")
    }

    async fn set_risk_checks(&self, enabled: bool) -> Result<bool> {
        self.record("set_risk_checks")?;
        Ok(enabled)
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        self.record("server_info")?;
        Ok(self.server_info.clone())
    }

    async fn open_position_count(&self) -> Result<u64> {
        self.record("open_position_count")?;
        Ok(self.position_count)
    }
}
