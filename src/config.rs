//! Configuration loading from TOML files.
//!
//! All timing knobs of the transport live here so tests can shrink them to
//! milliseconds. [`Config::default`] mirrors the production endpoints and
//! the timing the remote service expects.

use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub channel: ChannelConfig,
    pub reconnect: ReconnectConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Endpoints for the two transports.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// WebSocket endpoint for the persistent channel.
    pub ws_url: String,
    /// Base URL for the stateless HTTP fallback.
    pub api_url: String,
}

/// Persistent-channel behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// How long a channel-open attempt may take before it is abandoned.
    pub connect_timeout_ms: u64,
    /// How long a correlated request waits for its response.
    pub request_timeout_ms: u64,
    /// Period of the health probe that re-attempts a downed channel.
    pub health_check_interval_ms: u64,
    /// Replay tracked subscriptions after a successful reconnect.
    ///
    /// Off by default: the server is assumed to restore push state on its
    /// own. Turn on when talking to a server that forgets subscriptions
    /// across connections.
    pub resubscribe_on_reconnect: bool,
}

/// Bounded reconnection after a network-level connection loss.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Attempts made by the failure path before giving up until the next
    /// health probe.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay_ms: u64,
}

/// HTTP client settings for the fallback path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.ws_url.is_empty() {
            return Err(ConfigError::MissingField { field: "ws_url" }.into());
        }
        if self.network.api_url.is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" }.into());
        }

        let ws = url::Url::parse(&self.network.ws_url)?;
        if ws.scheme() != "ws" && ws.scheme() != "wss" {
            return Err(ConfigError::InvalidValue {
                field: "ws_url",
                reason: format!("expected ws:// or wss:// scheme, got {}", ws.scheme()),
            }
            .into());
        }

        let api = url::Url::parse(&self.network.api_url)?;
        if api.scheme() != "http" && api.scheme() != "https" {
            return Err(ConfigError::InvalidValue {
                field: "api_url",
                reason: format!("expected http:// or https:// scheme, got {}", api.scheme()),
            }
            .into());
        }

        if self.channel.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_ms",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.channel.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than zero".into(),
            }
            .into());
        }

        Ok(())
    }

    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://trade.altoal.com/ws".into(),
            api_url: "https://trade.altoal.com/api".into(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            health_check_interval_ms: 30_000,
            resubscribe_on_reconnect: false,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 5_000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn default_timing_matches_service_contract() {
        let config = Config::default();
        assert_eq!(config.channel.connect_timeout_ms, 5_000);
        assert_eq!(config.channel.request_timeout_ms, 30_000);
        assert_eq!(config.channel.health_check_interval_ms, 30_000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delay_ms, 5_000);
        assert!(!config.channel.resubscribe_on_reconnect);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [network]
            ws_url = "wss://example.com/ws"
            api_url = "https://example.com/api"

            [reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.network.ws_url, "wss://example.com/ws");
        assert_eq!(config.reconnect.max_attempts, 3);
        // Unspecified sections keep their defaults
        assert_eq!(config.reconnect.delay_ms, 5_000);
        assert_eq!(config.channel.connect_timeout_ms, 5_000);
    }

    #[test]
    fn rejects_empty_ws_url() {
        let mut config = Config::default();
        config.network.ws_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_http_scheme_for_ws_url() {
        let mut config = Config::default();
        config.network.ws_url = "https://example.com/ws".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn rejects_ws_scheme_for_api_url() {
        let mut config = Config::default();
        config.network.api_url = "wss://example.com/api".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut config = Config::default();
        config.channel.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.channel.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
