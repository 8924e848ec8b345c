//! WebSocket implementation of the persistent channel.
//!
//! Owns frame-level concerns only: connecting, serializing outbound frames,
//! parsing inbound text, answering pings, and classifying close frames into
//! a [`CloseReason`]. Lifecycle policy lives in the connection task.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{error, info, trace, warn};

use crate::error::Result;
use crate::port::{ChannelEvent, CloseReason, DuplexChannel};
use crate::protocol::{InboundMessage, OutboundMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket channel to the remote service.
///
/// Re-openable: after a close, the next `open()` establishes a fresh
/// connection to the same URL.
pub struct WsChannel {
    /// The WebSocket URL to connect to (e.g. <wss://trade.altoal.com/ws>).
    url: String,
    ws: Option<WsStream>,
}

impl WsChannel {
    /// Creates a new channel for the given URL.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url, ws: None }
    }

    /// Classify a server close frame.
    ///
    /// Normal, going-away and policy closes are deliberate server intent;
    /// everything else (notably the abnormal 1006) is a network-level loss.
    fn classify_close(frame: Option<CloseFrame<'_>>) -> CloseReason {
        match frame {
            Some(frame) => {
                let reason = if frame.reason.is_empty() {
                    format!("close code {}", u16::from(frame.code))
                } else {
                    frame.reason.to_string()
                };
                match frame.code {
                    CloseCode::Normal | CloseCode::Away | CloseCode::Policy => {
                        CloseReason::ServerInitiated { reason }
                    }
                    _ => CloseReason::ConnectionLost { reason },
                }
            }
            None => CloseReason::ConnectionLost {
                reason: "connection closed without close frame".into(),
            },
        }
    }
}

#[async_trait]
impl DuplexChannel for WsChannel {
    async fn open(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to WebSocket");
        let (ws_stream, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "WebSocket connected");
        self.ws = Some(ws_stream);
        Ok(())
    }

    async fn send(&mut self, msg: OutboundMessage) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| crate::error::Error::Connection("Not connected".into()))?;
        let json = serde_json::to_string(&msg)?;
        trace!(bytes = json.len(), "Sending WebSocket text frame");
        ws.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            // Re-borrow each iteration so the close paths can drop the stream.
            let ws = self.ws.as_mut()?;
            let Some(msg_result) = ws.next().await else {
                self.ws = None;
                return Some(ChannelEvent::Closed(CloseReason::ConnectionLost {
                    reason: "stream ended".into(),
                }));
            };

            match msg_result {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    match serde_json::from_str::<InboundMessage>(&text) {
                        Ok(msg) => return Some(ChannelEvent::Inbound(msg)),
                        Err(e) => {
                            // Log parse failures but continue processing;
                            // one malformed frame must not kill the stream
                            warn!(error = %e, bytes = text.len(), "Failed to parse message");
                        }
                    }
                }
                Ok(Message::Ping(data)) => {
                    trace!("Received WebSocket ping");
                    if ws.send(Message::Pong(data)).await.is_err() {
                        self.ws = None;
                        return Some(ChannelEvent::Closed(CloseReason::ConnectionLost {
                            reason: "Failed to send pong".into(),
                        }));
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    self.ws = None;
                    return Some(ChannelEvent::Closed(Self::classify_close(frame)));
                }
                // Other message types (Binary, Pong, Frame) are ignored
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    self.ws = None;
                    return Some(ChannelEvent::Closed(CloseReason::ConnectionLost {
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn frame(code: CloseCode, reason: &'static str) -> Option<CloseFrame<'static>> {
        Some(CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        })
    }

    #[test]
    fn normal_close_is_server_initiated() {
        let reason = WsChannel::classify_close(frame(CloseCode::Normal, "shutting down"));
        assert_eq!(
            reason,
            CloseReason::ServerInitiated {
                reason: "shutting down".into()
            }
        );
    }

    #[test]
    fn going_away_and_policy_are_server_initiated() {
        assert!(matches!(
            WsChannel::classify_close(frame(CloseCode::Away, "maintenance")),
            CloseReason::ServerInitiated { .. }
        ));
        assert!(matches!(
            WsChannel::classify_close(frame(CloseCode::Policy, "protocol violation")),
            CloseReason::ServerInitiated { .. }
        ));
    }

    #[test]
    fn abnormal_close_is_connection_lost() {
        assert!(matches!(
            WsChannel::classify_close(frame(CloseCode::Abnormal, "")),
            CloseReason::ConnectionLost { .. }
        ));
        assert!(matches!(
            WsChannel::classify_close(frame(CloseCode::Error, "internal error")),
            CloseReason::ConnectionLost { .. }
        ));
    }

    #[test]
    fn missing_close_frame_is_connection_lost() {
        assert!(matches!(
            WsChannel::classify_close(None),
            CloseReason::ConnectionLost { .. }
        ));
    }

    #[test]
    fn empty_reason_falls_back_to_close_code() {
        let reason = WsChannel::classify_close(frame(CloseCode::Normal, ""));
        assert_eq!(reason.reason(), "close code 1000");
    }

    #[tokio::test]
    async fn send_before_open_fails() {
        let mut channel = WsChannel::new("wss://example.com/ws".into());
        let result = channel
            .send(OutboundMessage::Request {
                id: "x".into(),
                method: "get_balance".into(),
                params: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn next_event_before_open_is_none() {
        let mut channel = WsChannel::new("wss://example.com/ws".into());
        assert!(channel.next_event().await.is_none());
    }

    #[tokio::test]
    async fn close_before_open_is_a_noop() {
        let mut channel = WsChannel::new("wss://example.com/ws".into());
        channel.close().await; // Must not panic
    }
}
