//! Test doubles and fixtures.
//!
//! Available to unit tests and, behind the `testkit` feature, to
//! integration tests and downstream crates that mock the client's
//! transports.

pub mod api;
pub mod channel;
pub mod domain;

pub use api::ScriptedApi;
pub use channel::{paired_channel, PairedChannel, PairedChannelHandle, ScriptedChannel};

use crate::config::Config;

/// Config with millisecond-scale timing for fast transport tests.
#[must_use]
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.channel.connect_timeout_ms = 50;
    config.channel.request_timeout_ms = 100;
    config.channel.health_check_interval_ms = 10_000;
    config.reconnect.max_attempts = 3;
    config.reconnect.delay_ms = 10;
    config
}
