//! Integration tests for the fallback dispatcher: the stateless path
//! substitutes transparently, transport errors never reach callers raw,
//! and both transports produce the same result shapes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal_macros::dec;
use serde_json::json;
use tradelink::client::TradingClient;
use tradelink::domain::{OpenSessionRequest, SessionId};
use tradelink::protocol::{InboundMessage, OutboundMessage, Response};
use tradelink::testkit::{self, paired_channel, ScriptedApi, ScriptedChannel};
use tradelink::Error;

/// Client whose channel never comes up: every call must use the fallback.
fn fallback_only_client(api: ScriptedApi) -> TradingClient {
    let channel = ScriptedChannel::new()
        .with_open_results(vec![Err(Error::Connection("refused".into()))]);
    TradingClient::with_transports(channel, Arc::new(api), &testkit::fast_config())
}

#[tokio::test]
async fn operations_work_without_a_channel() {
    let api = ScriptedApi::new();
    let calls = api.calls();
    let client = fallback_only_client(api);
    client.connect().await; // Resolves; demotes to fallback.

    let sessions = client.sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, SessionId::new("sess-1"));

    let balance = client.balance().await.unwrap();
    assert_eq!(balance.currency, "USDT");

    let count = client.open_position_count().await.unwrap();
    assert_eq!(count, 3);

    let recorded = calls.lock().unwrap().clone();
    assert_eq!(recorded, vec!["sessions", "balance", "open_position_count"]);
}

#[tokio::test]
async fn channel_and_fallback_return_the_same_shape() {
    // Fallback path.
    let fallback_client = fallback_only_client(ScriptedApi::new());
    let from_fallback = fallback_client.sessions().await.unwrap();

    // Channel path serving the same server state.
    let (channel, mut handle) = paired_channel(32);
    let client =
        TradingClient::with_transports(channel, Arc::new(ScriptedApi::new()), &testkit::fast_config());
    client.connect().await;

    let request = client.sessions();
    let server = async {
        let OutboundMessage::Request { id, method, .. } = handle.next_sent().await.unwrap() else {
            panic!("expected a request frame");
        };
        assert_eq!(method, "get_all_sessions");
        let data = serde_json::to_value(vec![testkit::domain::session("sess-1")]).unwrap();
        handle
            .inject(InboundMessage::Response(Response {
                id,
                success: true,
                data: Some(data),
                error: None,
            }))
            .await;
    };
    let (from_channel, ()) = tokio::join!(request, server);

    assert_eq!(from_channel.unwrap(), from_fallback);
}

#[tokio::test]
async fn channel_timeout_retries_once_then_falls_back() {
    let (channel, mut handle) = paired_channel(32);
    let api = ScriptedApi::new();
    let calls = api.calls();
    let mut config = testkit::fast_config();
    config.channel.request_timeout_ms = 40;
    let client = TradingClient::with_transports(channel, Arc::new(api), &config);
    client.connect().await;

    // The server never answers; both the original and the single retry
    // time out, then the fallback serves the call.
    let start = Instant::now();
    let balance = client.balance().await.unwrap();
    assert_eq!(balance.total, dec!(10000));
    assert!(start.elapsed() >= Duration::from_millis(70), "two timeouts expected");

    // Exactly two frames went out: the request and its one retry.
    let mut sent = 0;
    while let Ok(Some(_)) =
        tokio::time::timeout(Duration::from_millis(20), handle.next_sent()).await
    {
        sent += 1;
    }
    assert_eq!(sent, 2);
    assert_eq!(calls.lock().unwrap().clone(), vec!["balance"]);
}

#[tokio::test]
async fn server_rejection_surfaces_without_fallback() {
    let (channel, mut handle) = paired_channel(32);
    let api = ScriptedApi::new();
    let calls = api.calls();
    let client = TradingClient::with_transports(channel, Arc::new(api), &testkit::fast_config());
    client.connect().await;

    let open_request = OpenSessionRequest {
        symbol: "BTCUSDT".into(),
        strategy: "momentum".into(),
        stake: dec!(500),
    };
    let request = client.open_session(&open_request);
    let server = async {
        let OutboundMessage::Request { id, .. } = handle.next_sent().await.unwrap() else {
            panic!("expected a request frame");
        };
        handle
            .inject(InboundMessage::Response(Response {
                id,
                success: false,
                data: None,
                error: Some("insufficient balance".into()),
            }))
            .await;
    };

    let (result, ()) = tokio::join!(request, server);
    match result {
        Err(Error::ServerRejected { message, .. }) => {
            assert_eq!(message, "insufficient balance");
        }
        other => panic!("expected ServerRejected, got {other:?}"),
    }
    // A domain rejection is final; the stateless path is not consulted.
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fallback_failure_is_the_surfaced_error() {
    let api = ScriptedApi::new().fail_with_status(503, "maintenance window");
    let client = fallback_only_client(api);
    client.connect().await;

    match client.sessions().await {
        Err(Error::FallbackHttp { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance window");
        }
        other => panic!("expected FallbackHttp, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_analyses_normalize_across_transports() {
    // Channel path wraps the batch in an object.
    let (channel, mut handle) = paired_channel(32);
    let client =
        TradingClient::with_transports(channel, Arc::new(ScriptedApi::new()), &testkit::fast_config());
    client.connect().await;

    let symbols = vec!["BTCUSDT".to_string()];
    let request = client.market_analysis_batch(&symbols);
    let server = async {
        let OutboundMessage::Request { id, .. } = handle.next_sent().await.unwrap() else {
            panic!("expected a request frame");
        };
        let analyses = serde_json::to_value(vec![testkit::domain::analysis("BTCUSDT")]).unwrap();
        handle
            .inject(InboundMessage::Response(Response {
                id,
                success: true,
                data: Some(json!({ "analyses": analyses })),
                error: None,
            }))
            .await;
    };
    let (from_channel, ()) = tokio::join!(request, server);

    // Fallback path returns a bare array.
    let fallback_client = fallback_only_client(ScriptedApi::new());
    let from_fallback = fallback_client.market_analysis_batch(&symbols).await;

    assert_eq!(from_channel.unwrap(), from_fallback.unwrap());
}

#[tokio::test]
async fn no_operation_hangs_when_everything_is_down() {
    let mut config = testkit::fast_config();
    config.channel.connect_timeout_ms = 50;
    config.channel.request_timeout_ms = 50;
    let channel = ScriptedChannel::new().with_open_delay(Duration::from_secs(10));
    let client = TradingClient::with_transports(
        channel,
        Arc::new(ScriptedApi::new().fail_with_status(502, "bad gateway")),
        &config,
    );

    let start = Instant::now();
    client.connect().await;
    let result = client.sessions().await;

    assert!(result.is_err());
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "operation must settle within the bounded timeouts"
    );
}

#[tokio::test]
async fn status_reports_fallback_mode() {
    let client = fallback_only_client(ScriptedApi::new());
    client.connect().await;

    let status = client.status();
    assert!(!status.connected);
    assert!(!status.using_channel);
    assert_eq!(status.subscriptions, 0);
}
