//! Persistent-channel port.
//!
//! [`DuplexChannel`] is the seam between the connection manager and the
//! concrete transport. Implementations own frame-level concerns (parsing,
//! keepalive, close-frame classification); the connection manager owns
//! lifecycle, correlation and routing.

use async_trait::async_trait;

use crate::error::Error;
use crate::protocol::{InboundMessage, OutboundMessage};

/// Why a channel stopped, as classified by the transport.
///
/// The distinction drives the reconnect decision: the client respects a
/// deliberate server close and stays on the fallback path, while a network
/// loss triggers the bounded reconnect procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server deliberately severed the connection (close frame with a
    /// normal/going-away/policy code). Do not reconnect from the failure path.
    ServerInitiated { reason: String },
    /// The connection dropped at the network level. Reconnection is
    /// appropriate.
    ConnectionLost { reason: String },
}

impl CloseReason {
    /// Human-readable close reason for logs.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::ServerInitiated { reason } | Self::ConnectionLost { reason } => reason,
        }
    }
}

/// Events a channel yields to the connection manager.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A parsed inbound frame.
    Inbound(InboundMessage),
    /// The channel terminated. No further events will arrive until the
    /// next successful [`DuplexChannel::open`].
    Closed(CloseReason),
}

/// A duplex message channel to the remote service.
///
/// Implementations are re-openable: after a close, a later `open()` call on
/// the same instance establishes a fresh connection.
#[async_trait]
pub trait DuplexChannel: Send {
    /// Establish the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established; the caller
    /// decides how to degrade.
    async fn open(&mut self) -> Result<(), Error>;

    /// Serialize and write one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not open or the write fails.
    async fn send(&mut self, msg: OutboundMessage) -> Result<(), Error>;

    /// Receive the next event.
    ///
    /// Blocks until an event is available. Returns `None` when the channel
    /// is not open; after a `Closed` event the stream yields `None` until
    /// reopened.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Tear down the underlying connection, if any. Idempotent.
    async fn close(&mut self);
}

/// Implement DuplexChannel for boxed trait objects to allow use with generic wrappers.
#[async_trait]
impl DuplexChannel for Box<dyn DuplexChannel> {
    async fn open(&mut self) -> Result<(), Error> {
        (**self).open().await
    }

    async fn send(&mut self, msg: OutboundMessage) -> Result<(), Error> {
        (**self).send(msg).await
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        (**self).next_event().await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }
}
