//! Side-channel audit trail written next to the agent's own log.
//!
//! Entries land under `logs/{logId}/{key}`; keys sort in write order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::ClientLogEvent;
use crate::domain::ports::CoordinationStore;
use crate::infrastructure::store::paths;

/// Writes [`ClientLogEvent`]s to the coordination store
///
/// Callers only ever hold an event once a log id is known, so nothing can
/// be written before the agent has acknowledged the job.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn CoordinationStore>,
    sequence: Arc<AtomicU64>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Persist one event; returns the store key it was written under
    pub async fn log_event(&self, event: &ClientLogEvent) -> Result<String, StoreError> {
        let key = entry_key(event, self.sequence.fetch_add(1, Ordering::Relaxed));
        let value = serde_json::to_value(event)?;
        self.store
            .write(&paths::log_event(&event.log_id, &key), value)
            .await?;

        info!(
            log_id = %event.log_id,
            event_type = %event.event_type,
            "audit event"
        );
        Ok(key)
    }
}

/// `<epoch millis>_<sequence>_<random>`, zero padded so lexical order is
/// write order even within one millisecond
fn entry_key(event: &ClientLogEvent, sequence: u64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{:013}_{sequence:08}_{}",
        event.timestamp.timestamp_millis(),
        &suffix[..6]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ClientEventType;
    use crate::infrastructure::store::InMemoryStore;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_written_under_log_id() {
        let store = Arc::new(InMemoryStore::new());
        let logger = AuditLogger::new(store.clone());

        let event = ClientLogEvent::new(
            "L1",
            ClientEventType::RequestSubmitted,
            "Request submitted",
            json!({"requestId": "r1"}),
            Utc::now(),
        );
        let key = logger.log_event(&event).await.unwrap();

        let stored = store
            .read(&paths::log_event("L1", &key))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["eventType"], "request_submitted");
        assert_eq!(stored["metadata"]["requestId"], "r1");
    }

    #[test]
    fn test_keys_sort_by_time() {
        let earlier = ClientLogEvent::new(
            "L1",
            ClientEventType::RequestSubmitted,
            "",
            json!({}),
            Utc::now() - chrono::Duration::seconds(5),
        );
        let later = ClientLogEvent::new(
            "L1",
            ClientEventType::JobCompleted,
            "",
            json!({}),
            Utc::now(),
        );
        assert!(entry_key(&earlier, 1) < entry_key(&later, 0));

        let now = Utc::now();
        let first = ClientLogEvent::new("L1", ClientEventType::RequestSubmitted, "", json!({}), now);
        let second =
            ClientLogEvent::new("L1", ClientEventType::AcknowledgmentReceived, "", json!({}), now);
        assert!(entry_key(&first, 9) < entry_key(&second, 10));
    }
}
