//! User-facing log stream.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::domain::models::{UserLogEntry, UserLogLevel};

const CHANNEL_CAPACITY: usize = 256;

/// Append-only log shown to the user
///
/// A line identical to the one directly before it (same text and level)
/// is dropped. Cloning shares the same stream.
#[derive(Clone)]
pub struct UserLog {
    entries: Arc<Mutex<Vec<UserLogEntry>>>,
    tx: broadcast::Sender<UserLogEntry>,
}

impl UserLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            tx,
        }
    }

    /// Append a line; returns `false` when it was suppressed as a repeat
    pub fn push(&self, level: UserLogLevel, message: impl Into<String>) -> bool {
        let message = message.into();
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries
                .last()
                .is_some_and(|last| last.level == level && last.message == message)
            {
                return false;
            }
            let entry = UserLogEntry {
                message,
                level,
                timestamp: Utc::now(),
            };
            entries.push(entry.clone());
            entry
        };

        tracing::debug!(level = %entry.level, message = %entry.message, "user log");
        // No receivers is fine; the entry is still kept in the history.
        let _ = self.tx.send(entry);
        true
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.push(UserLogLevel::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> bool {
        self.push(UserLogLevel::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.push(UserLogLevel::Error, message)
    }

    /// Everything logged so far
    pub fn entries(&self) -> Vec<UserLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Live feed of new entries for a UI
    pub fn subscribe(&self) -> broadcast::Receiver<UserLogEntry> {
        self.tx.subscribe()
    }
}

impl Default for UserLog {
    fn default() -> Self {
        Self::new()
    }
}
