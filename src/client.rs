//! Public client facade.
//!
//! [`TradingClient`] is the single entry point the application talks to.
//! Every operation is transport-agnostic: the dispatcher tries the channel
//! path when it is preferred and connected, reconnects and retries once on
//! a transport failure, and otherwise substitutes the stateless equivalent.
//! A caller sees either the operation's result or a meaningful domain
//! error, never a bare transport error.
//!
//! Construct one client at application start and clone the handle wherever
//! it is needed; clones share the connection, the pending-request map and
//! the subscription registry.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::domain::{
    Balance, ConnectivityStatus, MarketAnalysis, OpenSessionRequest, ServerInfo, Session,
    SessionId, Trade,
};
use crate::error::{Error, Result};
use crate::port::{DuplexChannel, FallbackApi};
use crate::protocol::{AnalysisBatch, Broadcast, ControlKind, PositionCount, RiskChecksState, Topic};
use crate::rest::RestClient;
use crate::transport::{self, ConnectionHandle, SubscriptionRegistry, WsChannel};

/// Dual-transport client for the remote trading service.
#[derive(Clone)]
pub struct TradingClient {
    link: ConnectionHandle,
    fallback: Arc<dyn FallbackApi>,
    registry: Arc<SubscriptionRegistry>,
}

impl TradingClient {
    /// Build a client with the real transports from `config`.
    ///
    /// No connection is attempted yet; call [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let channel = WsChannel::new(config.network.ws_url.clone());
        let fallback: Arc<dyn FallbackApi> = Arc::new(RestClient::from_config(config));
        Self::with_transports(channel, fallback, config)
    }

    /// Build a client over explicit transports. This is the seam the test
    /// kit uses; production code goes through [`new`](Self::new).
    pub fn with_transports(
        channel: impl DuplexChannel + 'static,
        fallback: Arc<dyn FallbackApi>,
        config: &Config,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let link = transport::spawn(channel, registry.clone(), config);
        Self {
            link,
            fallback,
            registry,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Establish the persistent channel. Idempotent and infallible: on any
    /// failure the client proceeds on the fallback path.
    pub async fn connect(&self) {
        self.link.connect().await;
    }

    /// Tear the channel down and stay on the fallback path until the next
    /// [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        self.link.disconnect().await;
    }

    /// Synchronous snapshot of the transport state, for a status panel.
    #[must_use]
    pub fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus {
            connected: self.link.is_connected(),
            using_channel: self.link.using_channel(),
            reconnect_attempts: self.link.reconnect_attempts(),
            subscriptions: self.registry.count(),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    /// Channel path with the two-tier retry: one reconnect-and-retry on a
    /// transport failure, after which the error is handed to the caller for
    /// the stateless substitution.
    async fn via_channel(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.link.using_channel() {
            return Err(Error::transport_unavailable("client is in fallback mode"));
        }

        match self.link.request(method, params.clone()).await {
            Err(err) if err.is_transport() => {
                debug!(method, error = %err, "channel path failed; reconnecting once");
                self.link.connect().await;
                if self.link.is_connected() {
                    self.link.request(method, params).await
                } else {
                    Err(err)
                }
            }
            other => other,
        }
    }

    /// Try the channel path, decode on success, substitute `fallback` on a
    /// transport failure. Domain errors pass through untouched.
    async fn dispatch<T, F, Fut>(&self, method: &str, params: Option<Value>, fallback: F) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.via_channel(method, params).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(err) if err.is_transport() => fallback().await,
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// List all trading sessions.
    pub async fn sessions(&self) -> Result<Vec<Session>> {
        self.dispatch("get_all_sessions", None, || self.fallback.sessions())
            .await
    }

    /// Fetch one session's current state.
    pub async fn session_status(&self, id: &SessionId) -> Result<Session> {
        let params = json!({ "session_id": id });
        self.dispatch("get_session_status", Some(params), || {
            self.fallback.session(id)
        })
        .await
    }

    /// List trades executed within a session.
    pub async fn session_trades(&self, id: &SessionId) -> Result<Vec<Trade>> {
        let params = json!({ "session_id": id });
        self.dispatch("get_session_trades", Some(params), || {
            self.fallback.session_trades(id)
        })
        .await
    }

    /// Open a new trading session.
    pub async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session> {
        let params = serde_json::to_value(request)?;
        self.dispatch("open_session", Some(params), || {
            self.fallback.open_session(request)
        })
        .await
    }

    /// Close a session; returns its final state.
    pub async fn close_session(&self, id: &SessionId) -> Result<Session> {
        let params = json!({ "session_id": id });
        self.dispatch("close_session", Some(params), || {
            self.fallback.close_session(id)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Analysis & balance
    // -----------------------------------------------------------------------

    /// Latest analysis for one symbol.
    pub async fn market_analysis(&self, symbol: &str) -> Result<MarketAnalysis> {
        let params = json!({ "symbol": symbol });
        self.dispatch("get_market_analysis", Some(params), || {
            self.fallback.market_analysis(symbol)
        })
        .await
    }

    /// Analyses for a batch of symbols, normalized to one shape whichever
    /// transport serves them.
    pub async fn market_analysis_batch(&self, symbols: &[String]) -> Result<Vec<MarketAnalysis>> {
        let params = json!({ "symbols": symbols });
        match self.via_channel("get_market_analysis_batch", Some(params)).await {
            Ok(value) => {
                let batch: AnalysisBatch = serde_json::from_value(value)?;
                Ok(batch.into_vec())
            }
            Err(err) if err.is_transport() => self.fallback.market_analysis_batch(symbols).await,
            Err(err) => Err(err),
        }
    }

    /// Aggregate balance across all sessions.
    pub async fn balance(&self) -> Result<Balance> {
        self.dispatch("get_balance", None, || self.fallback.balance())
            .await
    }

    // -----------------------------------------------------------------------
    // Service controls
    // -----------------------------------------------------------------------

    /// Start the server-side periodic analysis loop.
    pub async fn start_analysis(&self, interval_ms: Option<u64>) -> Result<()> {
        let params = json!({ "interval_ms": interval_ms });
        match self.via_channel("start_analysis", Some(params)).await {
            Ok(_ack) => Ok(()),
            Err(err) if err.is_transport() => self.fallback.start_analysis(interval_ms).await,
            Err(err) => Err(err),
        }
    }

    /// Stop the server-side periodic analysis loop.
    pub async fn stop_analysis(&self) -> Result<()> {
        match self.via_channel("stop_analysis", None).await {
            Ok(_ack) => Ok(()),
            Err(err) if err.is_transport() => self.fallback.stop_analysis().await,
            Err(err) => Err(err),
        }
    }

    /// Adjust the periodic analysis interval.
    pub async fn set_analysis_interval(&self, interval_ms: u64) -> Result<()> {
        let params = json!({ "interval_ms": interval_ms });
        match self.via_channel("set_analysis_interval", Some(params)).await {
            Ok(_ack) => Ok(()),
            Err(err) if err.is_transport() => self.fallback.set_analysis_interval(interval_ms).await,
            Err(err) => Err(err),
        }
    }

    /// Enable or disable server-side risk checks; returns the new state.
    pub async fn set_risk_checks(&self, enabled: bool) -> Result<bool> {
        let params = json!({ "enabled": enabled });
        match self.via_channel("set_risk_checks", Some(params)).await {
            Ok(value) => {
                let state: RiskChecksState = serde_json::from_value(value)?;
                Ok(state.enabled())
            }
            Err(err) if err.is_transport() => self.fallback.set_risk_checks(enabled).await,
            Err(err) => Err(err),
        }
    }

    /// Server build and runtime diagnostics.
    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.dispatch("get_server_info", None, || self.fallback.server_info())
            .await
    }

    /// Count of open positions across all sessions.
    pub async fn open_position_count(&self) -> Result<u64> {
        match self.via_channel("get_open_position_count", None).await {
            Ok(value) => {
                let count: PositionCount = serde_json::from_value(value)?;
                Ok(count.value())
            }
            Err(err) if err.is_transport() => self.fallback.open_position_count().await,
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Subscribe to session lifecycle broadcasts.
    pub async fn subscribe_sessions(&self) {
        self.subscribe(Topic::Sessions).await;
    }

    /// Subscribe to trade broadcasts for one session.
    pub async fn subscribe_trades(&self, session_id: SessionId) {
        self.subscribe(Topic::Trades { session_id }).await;
    }

    /// Subscribe to analysis broadcasts for one symbol.
    pub async fn subscribe_market_analysis(&self, symbol: impl Into<String>) {
        self.subscribe(Topic::MarketAnalysis {
            symbol: symbol.into(),
        })
        .await;
    }

    /// Unsubscribe from session lifecycle broadcasts.
    pub async fn unsubscribe_sessions(&self) {
        self.unsubscribe(Topic::Sessions).await;
    }

    /// Unsubscribe from one session's trade broadcasts.
    pub async fn unsubscribe_trades(&self, session_id: SessionId) {
        self.unsubscribe(Topic::Trades { session_id }).await;
    }

    /// Unsubscribe from one symbol's analysis broadcasts.
    pub async fn unsubscribe_market_analysis(&self, symbol: impl Into<String>) {
        self.unsubscribe(Topic::MarketAnalysis {
            symbol: symbol.into(),
        })
        .await;
    }

    /// Listen for broadcasts of one event type: `"sessions"`, `"trade"`,
    /// `"market_analysis"` or `"balance"`.
    ///
    /// Listening and subscribing are independent: `on` registers the local
    /// listener; a `subscribe_*` call asks the server to push. Broadcasts
    /// the server sends unprompted are delivered to listeners as well.
    #[must_use]
    pub fn on(&self, event_type: &'static str) -> broadcast::Receiver<Broadcast> {
        self.registry.on(event_type)
    }

    async fn subscribe(&self, topic: Topic) {
        // Idempotent: a tracked topic sends no second control frame.
        if !self.registry.track(&topic) {
            debug!(key = %topic.key(), "already subscribed");
            return;
        }
        self.link.control(ControlKind::Subscribe, topic).await;
    }

    async fn unsubscribe(&self, topic: Topic) {
        if !self.registry.forget(&topic) {
            return;
        }
        self.link.control(ControlKind::Unsubscribe, topic).await;
    }
}
