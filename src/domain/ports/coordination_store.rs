use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::StoreError;

/// Change notification delivered to a subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// Current value of the watched subtree (`None` when absent)
    Changed(Option<Value>),
    /// The store reported an error; the subscription should be considered dead
    Error(StoreError),
}

/// A live watch on one store path
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// cancels it; adapters observe the cancellation through their
/// [`WatchSender`] and release whatever backs the watch.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Create a connected sender/subscription pair for `path`
    pub fn channel(path: impl Into<String>) -> (WatchSender, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let sender = WatchSender {
            tx,
            cancel: cancel.clone(),
        };
        let subscription = Self {
            path: path.into(),
            events,
            cancel,
        };
        (sender, subscription)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event, or `None` once the adapter side has gone away
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Tear the watch down now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Adapter half of a [`Subscription`]
#[derive(Debug, Clone)]
pub struct WatchSender {
    tx: mpsc::UnboundedSender<WatchEvent>,
    cancel: CancellationToken,
}

impl WatchSender {
    /// Deliver an event; returns `false` once the subscriber is gone
    pub fn send(&self, event: WatchEvent) -> bool {
        !self.is_closed() && self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the subscriber unsubscribes
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

/// Port for the shared hierarchical key-value store
///
/// Paths are `/`-separated without a leading slash, e.g. `status/req_1`.
/// `subscribe` watches a whole subtree: any write at or below the path,
/// or above it, re-delivers the current value of the path. A new
/// subscription always delivers the current value first.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Read the value at `path`; `None` when absent
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value at `path`; writing `Value::Null` deletes it
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Watch `path` for changes
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drop_cancels_sender() {
        let (sender, subscription) = Subscription::channel("status/r1");
        assert!(sender.send(WatchEvent::Changed(None)));

        subscription.unsubscribe();

        assert!(sender.is_closed());
        assert!(!sender.send(WatchEvent::Changed(None)));
        sender.closed().await;
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sender, mut subscription) = Subscription::channel("status/r1");
        sender.send(WatchEvent::Changed(Some(serde_json::json!(1))));
        sender.send(WatchEvent::Changed(Some(serde_json::json!(2))));

        assert_eq!(
            subscription.next().await,
            Some(WatchEvent::Changed(Some(serde_json::json!(1))))
        );
        assert_eq!(
            subscription.next().await,
            Some(WatchEvent::Changed(Some(serde_json::json!(2))))
        );
        assert_eq!(subscription.path(), "status/r1");
    }
}
