//! Connection manager for the persistent channel.
//!
//! A background task owns the [`DuplexChannel`] and everything that touches
//! it: lifecycle, request correlation, control frames and broadcast routing.
//! The rest of the crate talks to it through a [`ConnectionHandle`] backed
//! by a command queue, so the channel itself is never shared and never
//! locked.
//!
//! Lifecycle rules, in order of precedence:
//!
//! - `connect()` never fails. An open error or timeout demotes the client
//!   to the fallback path and resolves; the caller is never blocked on
//!   transport availability.
//! - A server-initiated close is respected: no reconnection until the next
//!   health probe.
//! - A network-level loss triggers bounded reconnection: up to
//!   `max_attempts` tries, one fixed delay apart, scheduled through the
//!   actor loop so a `disconnect()` cancels them.
//! - The health probe attempts a fresh connect whenever the channel is down
//!   and the caller has not deliberately disconnected. It is the only path
//!   that can restore the channel once the bounded retries are exhausted.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::port::{ChannelEvent, CloseReason, DuplexChannel};
use crate::protocol::{ControlFrame, ControlKind, InboundMessage, OutboundMessage};
use crate::transport::pending::PendingRequests;
use crate::transport::subscription::SubscriptionRegistry;

/// Capacity of the command queue; enough for a burst of concurrent callers
/// without unbounded growth.
const COMMAND_CAPACITY: usize = 32;

/// Connection state of the persistent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Commands from the public handle to the connection task.
enum Command {
    /// Establish the channel if it is not already up. Always acked.
    Connect { ack: oneshot::Sender<()> },
    /// Correlated request over the channel.
    Request {
        method: String,
        params: Option<Value>,
        respond_to: oneshot::Sender<Result<Value>>,
    },
    /// Fire-and-forget subscribe/unsubscribe frame.
    Control(ControlFrame),
    /// Tear the channel down and suppress the health probe until the next
    /// `Connect`.
    Disconnect { ack: oneshot::Sender<()> },
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Transport state shared between the task and every handle.
///
/// Reads are lock-free so the facade can answer its connectivity query and
/// check request preconditions synchronously.
pub(crate) struct SharedState {
    state: AtomicU8,
    using_channel: AtomicBool,
    reconnect_attempts: AtomicU32,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            using_channel: AtomicBool::new(true),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            x if x == ConnectionState::Connected as u8 => ConnectionState::Connected,
            x if x == ConnectionState::Connecting as u8 => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub(crate) fn using_channel(&self) -> bool {
        self.using_channel.load(Ordering::SeqCst)
    }

    fn set_using_channel(&self, value: bool) {
        self.using_channel.store(value, Ordering::SeqCst);
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    fn incr_attempts(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reset_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Clonable handle to the connection task.
///
/// Dropping the last handle stops the task and closes the channel.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<SharedState>,
    request_timeout: Duration,
}

impl ConnectionHandle {
    /// Establish the channel. Idempotent; resolves when the attempt settles,
    /// whatever its outcome. Never returns an error: failure demotes the
    /// client to the fallback path instead.
    pub async fn connect(&self) {
        let (ack, done) = oneshot::channel();
        if self.cmd_tx.send(Command::Connect { ack }).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Tear the channel down. Side-effect-free when already disconnected.
    pub async fn disconnect(&self) {
        let (ack, done) = oneshot::channel();
        if self.cmd_tx.send(Command::Disconnect { ack }).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Send a correlated request over the channel path.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportUnavailable`] when the channel is down or the
    ///   client is on the fallback path; the dispatcher catches this and
    ///   retries statelessly.
    /// - [`Error::RequestTimeout`] when no response arrives in time. The
    ///   pending entry's receiver is dropped here, so a late response is
    ///   discarded by the task as a no-op.
    /// - [`Error::ServerRejected`] when the response carries `success: false`.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.shared.is_connected() || !self.shared.using_channel() {
            return Err(Error::transport_unavailable("channel path not active"));
        }

        let (respond_to, response) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request {
                method: method.to_string(),
                params,
                respond_to,
            })
            .await
            .map_err(|_| Error::transport_unavailable("connection task stopped"))?;

        match timeout(self.request_timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::transport_unavailable("connection task stopped")),
            Err(_) => Err(Error::RequestTimeout {
                method: method.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }

    /// Queue a subscribe/unsubscribe frame. A local no-op when the channel
    /// is down; the caller polls on demand instead of receiving push.
    pub async fn control(&self, kind: ControlKind, topic: crate::protocol::Topic) {
        let frame = ControlFrame {
            kind,
            payload: topic,
        };
        if self.cmd_tx.send(Command::Control(frame)).await.is_err() {
            debug!("connection task stopped; control frame dropped");
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether the channel is established right now.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Whether the client currently prefers the channel path.
    pub fn using_channel(&self) -> bool {
        self.shared.using_channel()
    }

    /// Reconnection attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Timing knobs lifted out of [`Config`] for the task.
struct Timing {
    connect_timeout: Duration,
    request_timeout: Duration,
    health_interval: Duration,
    reconnect_delay: Duration,
    reconnect_max_attempts: u32,
    resubscribe_on_reconnect: bool,
}

impl Timing {
    fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.channel.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.channel.request_timeout_ms),
            health_interval: Duration::from_millis(config.channel.health_check_interval_ms),
            reconnect_delay: Duration::from_millis(config.reconnect.delay_ms),
            reconnect_max_attempts: config.reconnect.max_attempts,
            resubscribe_on_reconnect: config.channel.resubscribe_on_reconnect,
        }
    }
}

/// Spawn the connection task for `channel` and return its handle.
///
/// The task exits when every handle has been dropped.
pub fn spawn<C>(
    channel: C,
    registry: Arc<SubscriptionRegistry>,
    config: &Config,
) -> ConnectionHandle
where
    C: DuplexChannel + 'static,
{
    let shared = Arc::new(SharedState::new());
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
    let timing = Timing::from_config(config);
    let request_timeout = timing.request_timeout;

    let task = ConnectionTask {
        channel,
        cmd_rx,
        pending: PendingRequests::new(),
        registry,
        shared: shared.clone(),
        timing,
        reconnect_at: None,
        user_closed: false,
    };
    tokio::spawn(task.run());

    ConnectionHandle {
        cmd_tx,
        shared,
        request_timeout,
    }
}

struct ConnectionTask<C: DuplexChannel> {
    channel: C,
    cmd_rx: mpsc::Receiver<Command>,
    pending: PendingRequests,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<SharedState>,
    timing: Timing,
    /// When the next bounded reconnect attempt fires, if one is scheduled.
    reconnect_at: Option<Instant>,
    /// Set by `Disconnect`, cleared by `Connect`; suppresses the health probe.
    user_closed: bool,
}

impl<C: DuplexChannel> ConnectionTask<C> {
    async fn run(mut self) {
        let mut health = interval(self.timing.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = interval(self.timing.request_timeout);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume both so
        // neither timer fires at startup.
        health.tick().await;
        sweep.tick().await;

        loop {
            let reconnect_at = self.reconnect_at;
            let reconnect_timer = async move {
                match reconnect_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        // Every handle dropped: shut down.
                        None => break,
                    }
                }
                event = self.channel.next_event(), if self.shared.is_connected() => {
                    self.handle_channel_event(event).await;
                }
                () = reconnect_timer, if reconnect_at.is_some() && !self.shared.is_connected() => {
                    self.reconnect_at = None;
                    if !self.try_open("reconnect").await {
                        self.schedule_reconnect();
                    }
                }
                _ = health.tick() => {
                    self.health_check().await;
                }
                _ = sweep.tick() => {
                    self.pending.sweep(self.timing.request_timeout);
                }
            }
        }

        self.channel.close().await;
        self.shared.set_state(ConnectionState::Disconnected);
        self.pending
            .fail_all(|method| Error::transport_unavailable(format!("client stopped while awaiting '{method}'")));
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { ack } => {
                self.user_closed = false;
                if !self.shared.is_connected() {
                    self.try_open("connect").await;
                }
                let _ = ack.send(());
            }
            Command::Request {
                method,
                params,
                respond_to,
            } => {
                self.handle_request(method, params, respond_to).await;
            }
            Command::Control(frame) => {
                // Fire-and-forget: when the channel is down this is a local
                // no-op and the caller falls back to on-demand polling.
                if !self.shared.is_connected() {
                    debug!("channel down; control frame skipped");
                    return;
                }
                if let Err(err) = self.channel.send(OutboundMessage::Control(frame)).await {
                    debug!(error = %err, "control frame write failed");
                }
            }
            Command::Disconnect { ack } => {
                self.user_closed = true;
                self.reconnect_at = None;
                self.channel.close().await;
                self.shared.set_state(ConnectionState::Disconnected);
                self.pending.fail_all(|method| {
                    Error::transport_unavailable(format!("disconnected while awaiting '{method}'"))
                });
                let _ = ack.send(());
            }
        }
    }

    async fn handle_request(
        &mut self,
        method: String,
        params: Option<Value>,
        respond_to: oneshot::Sender<Result<Value>>,
    ) {
        // The handle checks preconditions before queueing, but state may
        // have changed while the command sat in the queue.
        if !self.shared.is_connected() || !self.shared.using_channel() {
            let _ = respond_to.send(Err(Error::transport_unavailable("channel path not active")));
            return;
        }

        let id = self.pending.register(&method, respond_to);
        let frame = OutboundMessage::Request {
            id: id.clone(),
            method: method.clone(),
            params,
        };
        if let Err(err) = self.channel.send(frame).await {
            warn!(method = %method, error = %err, "channel write failed");
            if let Some(entry) = self.pending.remove(&id) {
                entry.settle(Err(Error::transport_unavailable(err.to_string())));
            }
            self.on_closed(CloseReason::ConnectionLost {
                reason: err.to_string(),
            })
            .await;
        } else {
            debug!(id = %id, method = %method, in_flight = self.pending.len(), "request sent");
        }
    }

    async fn handle_channel_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Inbound(msg)) => self.route_inbound(msg),
            Some(ChannelEvent::Closed(reason)) => self.on_closed(reason).await,
            None => {
                self.on_closed(CloseReason::ConnectionLost {
                    reason: "channel stream ended".into(),
                })
                .await;
            }
        }
    }

    /// Route one inbound frame: a response settles its pending entry; a
    /// broadcast fans out through the registry. A response without a pending
    /// entry (late arrival after its timeout) is dropped.
    fn route_inbound(&mut self, msg: InboundMessage) {
        match msg {
            InboundMessage::Response(response) => match self.pending.remove(&response.id) {
                Some(entry) => {
                    let method = entry.method().to_string();
                    entry.settle(response.into_result(&method));
                }
                None => {
                    debug!(id = %response.id, "response without pending request; dropping");
                }
            },
            InboundMessage::Broadcast(broadcast) => self.registry.emit(broadcast),
        }
    }

    /// One channel-open attempt, bounded by the connect timeout. Success
    /// restores the channel path and resets the retry counter; any failure
    /// demotes to the fallback path. Never propagates an error.
    async fn try_open(&mut self, origin: &str) -> bool {
        self.shared.set_state(ConnectionState::Connecting);
        info!(origin, "opening channel");

        match timeout(self.timing.connect_timeout, self.channel.open()).await {
            Ok(Ok(())) => {
                self.shared.set_state(ConnectionState::Connected);
                self.shared.set_using_channel(true);
                self.shared.reset_attempts();
                self.reconnect_at = None;
                info!("channel established");
                if self.timing.resubscribe_on_reconnect {
                    self.replay_subscriptions().await;
                }
                true
            }
            Ok(Err(err)) => {
                warn!(error = %err, "channel open failed; using fallback path");
                self.demote();
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timing.connect_timeout.as_millis() as u64,
                    "channel open timed out; using fallback path"
                );
                self.channel.close().await;
                self.demote();
                false
            }
        }
    }

    fn demote(&mut self) {
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.set_using_channel(false);
    }

    async fn on_closed(&mut self, reason: CloseReason) {
        self.shared.set_state(ConnectionState::Disconnected);
        self.pending.fail_all(|method| {
            Error::transport_unavailable(format!("channel closed while awaiting '{method}'"))
        });

        match reason {
            CloseReason::ServerInitiated { reason } => {
                info!(reason = %reason, "server closed the channel; staying on fallback path");
                self.shared.set_using_channel(false);
            }
            CloseReason::ConnectionLost { reason } => {
                warn!(reason = %reason, "channel connection lost");
                self.schedule_reconnect();
            }
        }
    }

    /// Schedule the next bounded reconnect attempt, or give up and demote
    /// once the budget is spent. The health probe takes over from there.
    fn schedule_reconnect(&mut self) {
        let attempts = self.shared.attempts();
        if attempts >= self.timing.reconnect_max_attempts {
            warn!(
                attempts,
                "reconnect attempts exhausted; using fallback path until next health probe"
            );
            self.shared.set_using_channel(false);
            self.reconnect_at = None;
            return;
        }

        let attempt = self.shared.incr_attempts();
        self.reconnect_at = Some(Instant::now() + self.timing.reconnect_delay);
        info!(
            attempt,
            max_attempts = self.timing.reconnect_max_attempts,
            delay_ms = self.timing.reconnect_delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    /// Periodic probe: attempt a fresh connect whenever the channel is down,
    /// unless the caller tore it down deliberately. Unlike the failure path
    /// this is not bounded by the retry counter.
    async fn health_check(&mut self) {
        if self.shared.is_connected() || self.user_closed {
            return;
        }
        debug!("health probe: channel down, attempting fresh connect");
        self.reconnect_at = None;
        self.try_open("health-probe").await;
    }

    /// Replay subscribe frames for every tracked topic after a reconnect.
    async fn replay_subscriptions(&mut self) {
        let topics = self.registry.tracked();
        if topics.is_empty() {
            return;
        }
        debug!(topics = topics.len(), "replaying subscriptions");
        for topic in topics {
            let frame = ControlFrame {
                kind: ControlKind::Subscribe,
                payload: topic,
            };
            if let Err(err) = self.channel.send(OutboundMessage::Control(frame)).await {
                debug!(error = %err, "subscription replay write failed");
                return;
            }
        }
    }
}
