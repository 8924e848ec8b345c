//! Subscription registry and broadcast fan-out.
//!
//! Tracks which broadcast topics the client has asked the server to push,
//! keyed by composite topic key (`trades_<session>`, `market_analysis_<symbol>`).
//! The tracked set exists for introspection and for the optional
//! resubscribe-after-reconnect replay; it does not gate delivery. Inbound
//! broadcasts fan out to every listener registered under the broadcast's
//! `type` tag, in arrival order per topic.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::protocol::{Broadcast, Topic};

/// Per-event-type buffer for listeners that fall behind.
const LISTENER_CAPACITY: usize = 64;

/// Topic bookkeeping plus the listener hub.
///
/// Shared between the facade (subscribe/unsubscribe, `on`) and the
/// connection actor (emit, replay). All locks are short-lived and never
/// held across an await.
pub struct SubscriptionRegistry {
    topics: Mutex<HashMap<String, Topic>>,
    listeners: Mutex<HashMap<&'static str, broadcast::Sender<Broadcast>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Track a topic. Returns `true` when the topic was not already tracked;
    /// a `false` means the subscribe is redundant and no control frame
    /// should be sent.
    pub fn track(&self, topic: &Topic) -> bool {
        self.topics
            .lock()
            .insert(topic.key(), topic.clone())
            .is_none()
    }

    /// Forget a topic. Returns `true` when it was tracked.
    pub fn forget(&self, topic: &Topic) -> bool {
        self.topics.lock().remove(&topic.key()).is_some()
    }

    /// Whether a topic is currently tracked.
    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.lock().contains_key(&topic.key())
    }

    /// Number of tracked topics.
    pub fn count(&self) -> usize {
        self.topics.lock().len()
    }

    /// Snapshot of tracked topics, for the reconnect replay.
    pub fn tracked(&self) -> Vec<Topic> {
        self.topics.lock().values().cloned().collect()
    }

    /// Register a listener for one broadcast event type
    /// (`"sessions"`, `"trade"`, `"market_analysis"`, `"balance"`).
    ///
    /// Listeners registered for the same type each receive every broadcast
    /// of that type, in arrival order. A slow listener that falls too far
    /// behind observes a lag error on its receiver rather than blocking
    /// delivery to others.
    pub fn on(&self, event_type: &'static str) -> broadcast::Receiver<Broadcast> {
        self.listeners
            .lock()
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(LISTENER_CAPACITY).0)
            .subscribe()
    }

    /// Fan a broadcast out to the listeners of its event type.
    ///
    /// Without listeners the broadcast is dropped; push data is a cache
    /// refresh, not a durable feed.
    pub fn emit(&self, broadcast: Broadcast) {
        let event_type = broadcast.event_type();
        let delivered = match self.listeners.lock().get(event_type) {
            Some(sender) => sender.send(broadcast).unwrap_or(0),
            None => 0,
        };
        trace!(event_type, delivered, "broadcast dispatched");
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionId;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn analysis_topic(symbol: &str) -> Topic {
        Topic::MarketAnalysis {
            symbol: symbol.into(),
        }
    }

    fn balance_broadcast(total: rust_decimal::Decimal) -> Broadcast {
        Broadcast::Balance(crate::domain::Balance {
            currency: "USDT".into(),
            total,
            available: total,
            updated_at: Utc::now(),
        })
    }

    // -------------------------------------------------------------------------
    // Topic tracking
    // -------------------------------------------------------------------------

    #[test]
    fn tracking_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let topic = analysis_topic("BTCUSDT");

        assert!(registry.track(&topic));
        assert!(!registry.track(&topic)); // Second subscribe is redundant
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn distinct_scopes_are_distinct_topics() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.track(&analysis_topic("BTCUSDT")));
        assert!(registry.track(&analysis_topic("ETHUSDT")));
        assert!(registry.track(&Topic::Trades {
            session_id: SessionId::new("sess-1")
        }));
        assert_eq!(registry.count(), 3);
    }

    #[test]
    fn forget_removes_the_key() {
        let registry = SubscriptionRegistry::new();
        let topic = analysis_topic("BTCUSDT");

        registry.track(&topic);
        assert!(registry.forget(&topic));
        assert!(!registry.forget(&topic)); // Already gone
        assert!(!registry.contains(&topic));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn tracked_snapshot_contains_topics_for_replay() {
        let registry = SubscriptionRegistry::new();
        registry.track(&Topic::Sessions);
        registry.track(&analysis_topic("BTCUSDT"));

        let tracked = registry.tracked();
        assert_eq!(tracked.len(), 2);
        assert!(tracked.contains(&Topic::Sessions));
    }

    // -------------------------------------------------------------------------
    // Broadcast fan-out
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn emit_reaches_all_listeners_of_the_type() {
        let registry = SubscriptionRegistry::new();
        let mut rx1 = registry.on("balance");
        let mut rx2 = registry.on("balance");

        registry.emit(balance_broadcast(dec!(100)));

        assert!(matches!(rx1.recv().await.unwrap(), Broadcast::Balance(_)));
        assert!(matches!(rx2.recv().await.unwrap(), Broadcast::Balance(_)));
    }

    #[tokio::test]
    async fn emit_does_not_cross_event_types() {
        let registry = SubscriptionRegistry::new();
        let mut balance_rx = registry.on("balance");
        let mut sessions_rx = registry.on("sessions");

        registry.emit(balance_broadcast(dec!(1)));

        assert!(balance_rx.recv().await.is_ok());
        assert!(sessions_rx.try_recv().is_err());
    }

    #[test]
    fn emit_without_listeners_is_a_noop() {
        let registry = SubscriptionRegistry::new();
        registry.emit(balance_broadcast(dec!(1))); // Must not panic
    }

    #[tokio::test]
    async fn same_topic_broadcasts_arrive_in_order() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.on("balance");

        registry.emit(balance_broadcast(dec!(1)));
        registry.emit(balance_broadcast(dec!(2)));
        registry.emit(balance_broadcast(dec!(3)));

        for expected in [dec!(1), dec!(2), dec!(3)] {
            match rx.recv().await.unwrap() {
                Broadcast::Balance(balance) => assert_eq!(balance.total, expected),
                other => panic!("unexpected broadcast: {other:?}"),
            }
        }
    }
}
