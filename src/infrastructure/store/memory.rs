//! In-process coordination store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::paths;
use crate::domain::errors::StoreError;
use crate::domain::ports::{CoordinationStore, Subscription, WatchEvent, WatchSender};

struct Watcher {
    path: Vec<String>,
    sender: WatchSender,
}

struct Inner {
    root: Value,
    watchers: Vec<Watcher>,
}

/// JSON tree held in memory with subtree watches
///
/// Object keys keep insertion order. Writing `null` deletes the key and
/// prunes parents left empty, so reads of a fully deleted subtree return
/// `None` rather than `{}`.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    /// Start from an existing tree
    pub fn with_data(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self {
            inner: Mutex::new(Inner {
                root,
                watchers: Vec::new(),
            }),
        }
    }

    /// Live subscriptions on exactly `path`
    pub async fn subscriber_count(&self, path: &str) -> usize {
        let wanted = paths::segments(path);
        let mut inner = self.inner.lock().await;
        inner.watchers.retain(|w| !w.sender.is_closed());
        inner
            .watchers
            .iter()
            .filter(|w| w.path.iter().map(String::as_str).eq(wanted.iter().copied()))
            .count()
    }

    /// Live subscriptions on any path
    pub async fn total_subscribers(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.watchers.retain(|w| !w.sender.is_closed());
        inner.watchers.len()
    }

    /// Full copy of the tree
    pub async fn snapshot(&self) -> Value {
        self.inner.lock().await.root.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn get_at<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(node, |current, key| current.as_object()?.get(*key))
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let prune = {
            let child = map.entry((*first).to_string()).or_insert(Value::Null);
            set_at(child, rest, value);
            child.is_null() || child.as_object().is_some_and(Map::is_empty)
        };
        if prune {
            map.shift_remove(*first);
        }
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = paths::segments(path);
        let inner = self.inner.lock().await;
        Ok(get_at(&inner.root, &segments).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = paths::segments(path);
        let mut inner = self.inner.lock().await;
        inner.watchers.retain(|w| !w.sender.is_closed());

        // Snapshot every affected watch before the write so only real
        // changes are delivered.
        let before: Vec<(usize, Option<Value>)> = inner
            .watchers
            .iter()
            .enumerate()
            .filter_map(|(idx, w)| {
                let watched: Vec<&str> = w.path.iter().map(String::as_str).collect();
                paths::overlaps(&watched, &segments)
                    .then(|| (idx, get_at(&inner.root, &watched).cloned()))
            })
            .collect();

        if segments.is_empty() && value.is_null() {
            inner.root = Value::Object(Map::new());
        } else {
            set_at(&mut inner.root, &segments, value);
        }

        for (idx, old) in before {
            let watcher = &inner.watchers[idx];
            let watched: Vec<&str> = watcher.path.iter().map(String::as_str).collect();
            let current = get_at(&inner.root, &watched).cloned();
            if current != old {
                watcher.sender.send(WatchEvent::Changed(current));
            }
        }

        tracing::trace!(path = %path, "store write");
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let segments = paths::segments(path);
        let (sender, subscription) = Subscription::channel(path);
        let mut inner = self.inner.lock().await;

        sender.send(WatchEvent::Changed(get_at(&inner.root, &segments).cloned()));
        inner.watchers.push(Watcher {
            path: segments.into_iter().map(str::to_string).collect(),
            sender,
        });

        tracing::debug!(path = %path, "subscribed");
        Ok(subscription)
    }
}
