//! Polling transport: subscriptions implemented as periodic reads.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::errors::StoreError;
use crate::domain::ports::{CoordinationStore, Subscription, WatchEvent};

/// Consecutive failed reads before a polling subscription gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Wraps any store and serves `subscribe` by polling `read`
///
/// Reads and writes pass straight through. Only changed values are
/// delivered, so subscribers see the same event shape as with push.
pub struct PollingStore {
    inner: Arc<dyn CoordinationStore>,
    interval: Duration,
}

impl PollingStore {
    pub fn new(inner: Arc<dyn CoordinationStore>, interval: Duration) -> Self {
        Self { inner, interval }
    }
}

#[async_trait]
impl CoordinationStore for PollingStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let (sender, subscription) = Subscription::channel(path);
        let inner = Arc::clone(&self.inner);
        let period = self.interval;
        let path = path.to_string();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Option<Value>> = None;
            let mut failures = 0;

            loop {
                tokio::select! {
                    () = sender.closed() => {
                        debug!(path = %path, "polling subscription closed");
                        break;
                    }
                    _ = ticker.tick() => {
                        match inner.read(&path).await {
                            Ok(current) => {
                                failures = 0;
                                if last.as_ref() == Some(&current) {
                                    continue;
                                }
                                if !sender.send(WatchEvent::Changed(current.clone())) {
                                    break;
                                }
                                last = Some(current);
                            }
                            Err(err) => {
                                failures += 1;
                                warn!(path = %path, error = %err, failures, "poll read failed");
                                if failures >= MAX_CONSECUTIVE_FAILURES {
                                    sender.send(WatchEvent::Error(err));
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(subscription)
    }
}
