//! Diagnostic information: server build info and client connectivity.

use serde::{Deserialize, Serialize};

/// Server build and runtime information, for a diagnostics panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: String,
    pub uptime_secs: u64,
    /// Interval of the server-side periodic analysis loop, if running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_interval_ms: Option<u64>,
    pub risk_checks_enabled: bool,
}

/// Snapshot of the client's transport state.
///
/// Read synchronously from shared state; answering this query never touches
/// the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    /// Whether the persistent channel is currently established.
    pub connected: bool,
    /// Whether the client currently prefers the channel path over fallback.
    pub using_channel: bool,
    /// Reconnection attempts made since the last successful connection.
    pub reconnect_attempts: u32,
    /// Number of broadcast topics the client is subscribed to.
    pub subscriptions: usize,
}
