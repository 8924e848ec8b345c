//! Mock [`DuplexChannel`] implementations for testing.
//!
//! Two mock channel types for different testing needs:
//!
//! - [`ScriptedChannel`] — Pre-loaded open results and inbound events.
//!   Best for: connect/timeout handling, reconnection logic, demotion.
//!
//! - [`paired_channel`] — Channel driven externally via a control handle
//!   that injects inbound events and observes outbound frames.
//!   Best for: request correlation and subscription flow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::port::{ChannelEvent, CloseReason, DuplexChannel};
use crate::protocol::{InboundMessage, OutboundMessage};

// ---------------------------------------------------------------------------
// ScriptedChannel
// ---------------------------------------------------------------------------

/// A mock channel with scripted open results and a fixed event queue.
///
/// Each `open()` pops the next result from the queue (defaults to `Ok(())`
/// when exhausted). `next_event()` pops the next scripted event and blocks
/// forever once the queue is empty, simulating a quiet connection.
pub struct ScriptedChannel {
    open_results: VecDeque<Result<()>>,
    open_delay: Option<Duration>,
    events: VecDeque<ChannelEvent>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    open_count: Arc<AtomicU32>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            open_results: VecDeque::new(),
            open_delay: None,
            events: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            open_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_open_results(mut self, results: Vec<Result<()>>) -> Self {
        self.open_results = results.into();
        self
    }

    /// Delay every `open()` by `delay` before yielding its result, to
    /// exercise the connect timeout.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn with_events(mut self, events: Vec<ChannelEvent>) -> Self {
        self.events = events.into();
        self
    }

    /// Shared counter of `open()` calls, for asserting attempt counts.
    pub fn open_count(&self) -> Arc<AtomicU32> {
        self.open_count.clone()
    }

    /// Shared recorder of every frame written to the channel.
    pub fn sent_frames(&self) -> Arc<Mutex<Vec<OutboundMessage>>> {
        self.sent.clone()
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DuplexChannel for ScriptedChannel {
    async fn open(&mut self) -> Result<()> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        self.open_results.pop_front().unwrap_or(Ok(()))
    }

    async fn send(&mut self, msg: OutboundMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        match self.events.pop_front() {
            Some(event) => Some(event),
            // Quiet connection: stay open, deliver nothing.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// PairedChannel
// ---------------------------------------------------------------------------

/// A mock channel controlled externally via a [`PairedChannelHandle`].
///
/// Inbound events are injected through the handle; outbound frames are
/// observable from it. No real network I/O.
pub struct PairedChannel {
    event_rx: mpsc::Receiver<ChannelEvent>,
    sent_tx: mpsc::Sender<OutboundMessage>,
    open_results: Arc<Mutex<VecDeque<Result<()>>>>,
    open_count: Arc<AtomicU32>,
}

/// Control handle for a [`PairedChannel`].
pub struct PairedChannelHandle {
    event_tx: mpsc::Sender<ChannelEvent>,
    sent_rx: mpsc::Receiver<OutboundMessage>,
    open_results: Arc<Mutex<VecDeque<Result<()>>>>,
    open_count: Arc<AtomicU32>,
}

impl PairedChannelHandle {
    /// Inject a parsed inbound frame.
    pub async fn inject(&self, msg: InboundMessage) {
        let _ = self.event_tx.send(ChannelEvent::Inbound(msg)).await;
    }

    /// Inject a raw JSON frame, as the wire would deliver it.
    ///
    /// # Panics
    ///
    /// Panics when `json` is not a valid inbound frame; tests script valid
    /// traffic explicitly.
    pub async fn inject_json(&self, json: &str) {
        let msg: InboundMessage = serde_json::from_str(json).expect("scripted frame must parse");
        self.inject(msg).await;
    }

    /// Terminate the channel with the given close reason.
    pub async fn close_with(&self, reason: CloseReason) {
        let _ = self.event_tx.send(ChannelEvent::Closed(reason)).await;
    }

    /// Next frame the client wrote to the channel.
    pub async fn next_sent(&mut self) -> Option<OutboundMessage> {
        self.sent_rx.recv().await
    }

    /// Script results for upcoming `open()` calls (default `Ok(())`).
    pub fn script_open_results(&self, results: Vec<Result<()>>) {
        *self.open_results.lock().unwrap() = results.into();
    }

    /// How many times `open()` was called.
    pub fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::SeqCst)
    }
}

/// Create a [`PairedChannel`] and its control [`PairedChannelHandle`].
pub fn paired_channel(buffer: usize) -> (PairedChannel, PairedChannelHandle) {
    let (event_tx, event_rx) = mpsc::channel(buffer);
    let (sent_tx, sent_rx) = mpsc::channel(buffer);
    let open_results = Arc::new(Mutex::new(VecDeque::new()));
    let open_count = Arc::new(AtomicU32::new(0));
    (
        PairedChannel {
            event_rx,
            sent_tx,
            open_results: open_results.clone(),
            open_count: open_count.clone(),
        },
        PairedChannelHandle {
            event_tx,
            sent_rx,
            open_results,
            open_count,
        },
    )
}

#[async_trait]
impl DuplexChannel for PairedChannel {
    async fn open(&mut self) -> Result<()> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.open_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn send(&mut self, msg: OutboundMessage) -> Result<()> {
        self.sent_tx
            .send(msg)
            .await
            .map_err(|_| Error::Connection("test handle dropped".into()))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.event_rx.recv().await
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_channel_pops_open_results_then_defaults() {
        tokio_test::block_on(async {
            let mut channel = ScriptedChannel::new()
                .with_open_results(vec![Err(Error::Connection("refused".into()))]);
            let open_count = channel.open_count();

            assert!(channel.open().await.is_err());
            assert!(channel.open().await.is_ok()); // Queue exhausted: default Ok
            assert_eq!(open_count.load(Ordering::SeqCst), 2);
        });
    }

    #[tokio::test]
    async fn scripted_channel_records_sent_frames() {
        let mut channel = ScriptedChannel::new();
        let sent = channel.sent_frames();

        channel
            .send(OutboundMessage::Request {
                id: "1".into(),
                method: "get_balance".into(),
                params: None,
            })
            .await
            .unwrap();

        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn paired_channel_round_trips_frames() {
        let (mut channel, mut handle) = paired_channel(8);
        channel.open().await.unwrap();

        channel
            .send(OutboundMessage::Request {
                id: "req-1".into(),
                method: "get_balance".into(),
                params: None,
            })
            .await
            .unwrap();
        match handle.next_sent().await.unwrap() {
            OutboundMessage::Request { id, .. } => assert_eq!(id, "req-1"),
            other => panic!("unexpected frame: {other:?}"),
        }

        handle.inject_json(r#"{"id": "req-1", "success": true}"#).await;
        assert!(matches!(
            channel.next_event().await,
            Some(ChannelEvent::Inbound(InboundMessage::Response(_)))
        ));
    }
}
