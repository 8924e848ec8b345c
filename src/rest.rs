//! Stateless HTTP fallback client.
//!
//! One request per logical operation against the service's REST surface.
//! Response bodies mirror the channel path's `data` payloads, so both
//! transports decode into the same domain types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::{
    Balance, MarketAnalysis, OpenSessionRequest, ServerInfo, Session, SessionId, Trade,
};
use crate::error::{Error, Result};
use crate::port::FallbackApi;
use crate::protocol::{AnalysisBatch, PositionCount, RiskChecksState};

/// HTTP client for the service's stateless endpoints.
pub struct RestClient {
    http: HttpClient,
    base_url: String,
}

impl RestClient {
    /// Create a client with default HTTP settings.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: HttpClient::new(),
            base_url,
        }
    }

    /// Create a client with the configured timeouts.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.http.timeout_ms))
            .connect_timeout(Duration::from_millis(config.http.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            base_url: config.network.api_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "Fallback GET");
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "Fallback POST");
        let response = self.http.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    /// POST whose acknowledgment body carries nothing the caller needs.
    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        debug!(url = %url, "Fallback POST");
        let response = self.http.post(&url).json(body).send().await?;
        Self::check_status(&response)?;
        Ok(())
    }

    fn check_status(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::FallbackHttp {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(body) if !body.is_empty() => body,
                _ => status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            };
            return Err(Error::FallbackHttp {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|err| Error::FallbackHttp {
            status: status.as_u16(),
            message: format!("malformed response body: {err}"),
        })
    }
}

#[async_trait]
impl FallbackApi for RestClient {
    async fn sessions(&self) -> Result<Vec<Session>> {
        self.get("/sessions").await
    }

    async fn session(&self, id: &SessionId) -> Result<Session> {
        self.get(&format!("/sessions/{id}")).await
    }

    async fn session_trades(&self, id: &SessionId) -> Result<Vec<Trade>> {
        self.get(&format!("/sessions/{id}/trades")).await
    }

    async fn market_analysis(&self, symbol: &str) -> Result<MarketAnalysis> {
        self.get(&format!("/analysis/{symbol}")).await
    }

    async fn market_analysis_batch(&self, symbols: &[String]) -> Result<Vec<MarketAnalysis>> {
        let batch: AnalysisBatch = self
            .get(&format!("/analysis?symbols={}", symbols.join(",")))
            .await?;
        Ok(batch.into_vec())
    }

    async fn balance(&self) -> Result<Balance> {
        self.get("/balance").await
    }

    async fn open_session(&self, request: &OpenSessionRequest) -> Result<Session> {
        self.post("/sessions", request).await
    }

    async fn close_session(&self, id: &SessionId) -> Result<Session> {
        self.post(&format!("/sessions/{id}/close"), &serde_json::json!({}))
            .await
    }

    async fn start_analysis(&self, interval_ms: Option<u64>) -> Result<()> {
        self.post_unit(
            "/analysis/start",
            &serde_json::json!({ "interval_ms": interval_ms }),
        )
        .await
    }

    async fn stop_analysis(&self) -> Result<()> {
        self.post_unit("/analysis/stop", &serde_json::json!({})).await
    }

    async fn set_analysis_interval(&self, interval_ms: u64) -> Result<()> {
        self.post_unit(
            "/analysis/interval",
            &serde_json::json!({ "interval_ms": interval_ms }),
        )
        .await
    }

    async fn set_risk_checks(&self, enabled: bool) -> Result<bool> {
        let state: RiskChecksState = self
            .post("/risk-checks", &serde_json::json!({ "enabled": enabled }))
            .await?;
        Ok(state.enabled())
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        self.get("/info").await
    }

    async fn open_position_count(&self) -> Result<u64> {
        let count: PositionCount = self.get("/positions/count").await?;
        Ok(count.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = RestClient::new("https://example.com/api/".into());
        assert_eq!(client.url("/sessions"), "https://example.com/api/sessions");

        let client = RestClient::new("https://example.com/api".into());
        assert_eq!(client.url("/sessions"), "https://example.com/api/sessions");
    }

    #[test]
    fn batch_query_joins_symbols_with_commas() {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        assert_eq!(symbols.join(","), "BTCUSDT,ETHUSDT");
    }

    #[test]
    fn from_config_uses_configured_base_url() {
        let mut config = Config::default();
        config.network.api_url = "https://custom.example.com/api".into();
        let client = RestClient::from_config(&config);
        assert_eq!(client.base_url, "https://custom.example.com/api");
    }
}
