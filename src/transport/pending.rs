//! Pending-request tracking for the correlated channel path.
//!
//! Each in-flight request owns a map entry keyed by its id and a oneshot
//! sender back to the waiting caller. An entry settles exactly once: by a
//! matching response, or by the caller's timeout dropping the receiver (a
//! later response then finds a closed sender and is a no-op). The periodic
//! sweep removes entries whose caller is gone or whose age exceeds the
//! request timeout, so abandoned ids cannot accumulate.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Result;

/// A request dispatched over the channel, awaiting its response.
pub(crate) struct PendingRequest {
    method: String,
    respond_to: oneshot::Sender<Result<Value>>,
    created_at: Instant,
}

impl PendingRequest {
    /// The method name the request was issued for.
    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    /// Deliver the result to the waiting caller.
    ///
    /// A closed receiver (the caller timed out or was dropped) is a no-op;
    /// settling is at-most-once by construction since this consumes self.
    pub(crate) fn settle(self, result: Result<Value>) {
        if self.respond_to.send(result).is_err() {
            debug!(method = %self.method, "caller gone before response; dropping result");
        }
    }
}

/// Map of request id to pending entry. Owned by the connection actor; no
/// locking, all access is sequenced through the actor loop.
pub(crate) struct PendingRequests {
    entries: HashMap<String, PendingRequest>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a new request and return its generated id.
    ///
    /// Ids are a millisecond timestamp plus a random suffix; collision among
    /// concurrently pending ids is the only thing that matters, and the loop
    /// regenerates on the (vanishing) chance of one.
    pub(crate) fn register(
        &mut self,
        method: &str,
        respond_to: oneshot::Sender<Result<Value>>,
    ) -> String {
        let mut id = generate_id();
        while self.entries.contains_key(&id) {
            id = generate_id();
        }
        self.entries.insert(
            id.clone(),
            PendingRequest {
                method: method.to_string(),
                respond_to,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Remove and return the entry for `id`, if one is pending.
    pub(crate) fn remove(&mut self, id: &str) -> Option<PendingRequest> {
        self.entries.remove(id)
    }

    /// Settle every pending entry with the given error. Used when the
    /// channel closes under in-flight requests.
    pub(crate) fn fail_all(&mut self, make_error: impl Fn(&str) -> crate::error::Error) {
        for (_, entry) in self.entries.drain() {
            let err = make_error(&entry.method);
            entry.settle(Err(err));
        }
    }

    /// Drop entries whose caller has gone away or whose age exceeds
    /// `max_age`. Stale entries are not settled: their callers already
    /// received a timeout error.
    pub(crate) fn sweep(&mut self, max_age: Duration) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.respond_to.is_closed() && entry.created_at.elapsed() < max_age);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept stale pending requests");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Millisecond timestamp plus a short random suffix.
fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{millis}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn register_returns_distinct_ids() {
        let mut pending = PendingRequests::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();

        let id1 = pending.register("get_balance", tx1);
        let id2 = pending.register("get_balance", tx2);

        assert_ne!(id1, id2);
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn settle_delivers_to_waiting_caller() {
        let mut pending = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        let id = pending.register("get_all_sessions", tx);

        let entry = pending.remove(&id).unwrap();
        assert_eq!(entry.method(), "get_all_sessions");
        entry.settle(Ok(Value::Bool(true)));

        assert_eq!(rx.await.unwrap().unwrap(), Value::Bool(true));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn settle_after_caller_dropped_is_a_noop() {
        let mut pending = PendingRequests::new();
        let (tx, rx) = oneshot::channel::<crate::error::Result<Value>>();
        let id = pending.register("get_balance", tx);

        drop(rx); // Caller timed out
        let entry = pending.remove(&id).unwrap();
        entry.settle(Ok(Value::Null)); // Must not panic
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut pending = PendingRequests::new();
        assert!(pending.remove("no-such-id").is_none());
    }

    #[tokio::test]
    async fn fail_all_settles_every_entry() {
        let mut pending = PendingRequests::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        pending.register("get_balance", tx1);
        pending.register("get_server_info", tx2);

        pending.fail_all(|method| Error::transport_unavailable(format!("channel closed: {method}")));

        assert_eq!(pending.len(), 0);
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
    }

    #[test]
    fn sweep_drops_closed_receivers() {
        let mut pending = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        pending.register("get_balance", tx);
        drop(rx);

        pending.sweep(Duration::from_secs(30));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn sweep_keeps_live_fresh_entries() {
        let mut pending = PendingRequests::new();
        let (tx, _rx) = oneshot::channel();
        pending.register("get_balance", tx);

        pending.sweep(Duration::from_secs(30));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn sweep_drops_entries_past_max_age() {
        let mut pending = PendingRequests::new();
        let (tx, _rx) = oneshot::channel();
        pending.register("get_balance", tx);

        pending.sweep(Duration::from_millis(0));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn generated_ids_have_timestamp_and_suffix() {
        let id = generate_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), 8);
    }
}
