//! Configuration loading and validation.

use std::io::Write;

use tradelink::config::Config;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_a_full_config_file() {
    let file = write_config(
        r#"
        [network]
        ws_url = "wss://staging.example.com/ws"
        api_url = "https://staging.example.com/api"

        [channel]
        connect_timeout_ms = 2000
        request_timeout_ms = 15000
        health_check_interval_ms = 20000
        resubscribe_on_reconnect = true

        [reconnect]
        max_attempts = 10
        delay_ms = 1000

        [http]
        timeout_ms = 8000
        connect_timeout_ms = 3000

        [logging]
        level = "debug"
        format = "json"
        "#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.network.ws_url, "wss://staging.example.com/ws");
    assert_eq!(config.channel.connect_timeout_ms, 2000);
    assert!(config.channel.resubscribe_on_reconnect);
    assert_eq!(config.reconnect.max_attempts, 10);
    assert_eq!(config.http.timeout_ms, 8000);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn minimal_config_fills_defaults() {
    let file = write_config(
        r#"
        [network]
        ws_url = "wss://example.com/ws"
        api_url = "https://example.com/api"
        "#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.channel.connect_timeout_ms, 5_000);
    assert_eq!(config.channel.request_timeout_ms, 30_000);
    assert_eq!(config.reconnect.max_attempts, 5);
    assert_eq!(config.reconnect.delay_ms, 5_000);
    assert!(!config.channel.resubscribe_on_reconnect);
}

#[test]
fn missing_file_is_an_error() {
    let err = Config::load("/nonexistent/tradelink.toml").unwrap_err();
    assert!(err.to_string().contains("read config file"));
}

#[test]
fn invalid_toml_is_an_error() {
    let file = write_config("network = not toml");
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn wrong_ws_scheme_fails_validation() {
    let file = write_config(
        r#"
        [network]
        ws_url = "https://example.com/ws"
        api_url = "https://example.com/api"
        "#,
    );
    assert!(Config::load(file.path()).is_err());
}
