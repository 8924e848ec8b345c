//! Tradelink - resilient dual-transport client for a remote trading service.
//!
//! This crate brokers all communication between an application and a remote
//! trading/analysis service over two transports: a persistent WebSocket
//! channel for low-latency request/response and server push, and a
//! stateless HTTP surface the client degrades to transparently when the
//! channel is unavailable. Callers see plain async methods; which transport
//! served a call is invisible.
//!
//! # Architecture
//!
//! Five cooperating pieces, composed in [`client::TradingClient`]:
//!
//! - **connection manager** ([`transport::actor`]) - owns the channel
//!   lifecycle: never-fail connect with a bounded open timeout, bounded
//!   fixed-delay reconnection, a periodic health probe, and demotion to
//!   the fallback path on failure
//! - **request correlator** (`transport::pending`) - matches responses to
//!   in-flight requests by generated id, with per-request timeouts
//! - **subscription registry** ([`transport::subscription`]) - tracks
//!   broadcast topics and fans typed push messages out to listeners
//! - **fallback dispatcher** (in [`client`]) - channel path first, one
//!   reconnect-and-retry, then the stateless equivalent
//! - **public facade** ([`client::TradingClient`]) - the typed operation
//!   catalogue: sessions, trades, analyses, balance, service controls
//!
//! # Modules
//!
//! - [`config`] - TOML configuration: endpoints, timing, logging
//! - [`domain`] - typed payloads: sessions, trades, analyses, balance
//! - [`protocol`] - wire frames for the channel path
//! - [`port`] - trait seams: [`port::DuplexChannel`], [`port::FallbackApi`]
//! - [`transport`] - the persistent-channel machinery
//! - [`rest`] - the stateless HTTP fallback
//! - [`client`] - the facade applications call
//!
//! # Example
//!
//! ```no_run
//! use tradelink::client::TradingClient;
//! use tradelink::config::Config;
//!
//! # async fn run() {
//! let config = Config::default();
//! let client = TradingClient::new(&config);
//! client.connect().await; // never fails; falls back to HTTP if needed
//!
//! let sessions = client.sessions().await.unwrap();
//! let trades = client.on("trade");
//! client.subscribe_trades(sessions[0].id.clone()).await;
//! # }
//! ```

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod protocol;
pub mod rest;
pub mod transport;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use client::TradingClient;
pub use config::Config;
pub use error::{Error, Result};
