//! In-memory realtime store.
//!
//! Keeps one value tree with the same storage rules as the hosted store:
//! `null` and empty objects are not stored, so writing them deletes the
//! location, and parents left empty disappear. Every accepted write is also
//! appended to a log so tests can inspect exactly what the gateway sent.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use blaze_api::{StoreError, Value, ValueStream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::push_id::PushIdGenerator;
use crate::sanitize::contains_absent;
use crate::traits::RealtimeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Update,
    Push,
    Remove,
}

/// A write as received, before storage normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub kind: WriteKind,
    /// Path the value was written to; for pushes, including the new key
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone)]
enum StoreEvent {
    Changed,
    Failed { path: String, error: StoreError },
}

#[derive(Debug, Default)]
struct StoreState {
    root: Value,
    writes: Vec<RecordedWrite>,
    fail_next: Option<StoreError>,
}

/// Realtime store held entirely in memory.
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
    change_tx: broadcast::Sender<StoreEvent>,
    push_ids: Mutex<PushIdGenerator>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(1000);
        Self {
            state: Arc::new(RwLock::new(StoreState {
                root: Value::Null,
                ..Default::default()
            })),
            change_tx,
            push_ids: Mutex::new(PushIdGenerator::new()),
        }
    }

    /// Store `value` at `path` without recording a write.
    pub fn seed(&self, path: &str, value: Value) -> Result<(), StoreError> {
        reject_absent(&value)?;
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.root.set_path(path, value);
        }
        self.notify();
        Ok(())
    }

    /// Every write accepted so far, oldest first.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.read_state(|state| state.writes.clone())
    }

    /// The whole tree.
    pub fn snapshot(&self) -> Value {
        self.read_state(|state| state.root.clone())
    }

    /// Make the next write or read fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.fail_next = Some(error);
    }

    /// Report `error` to every subscriber of exactly `path`.
    pub fn inject_subscription_error(&self, path: &str, error: StoreError) {
        let _ = self.change_tx.send(StoreEvent::Failed {
            path: normalize_path(path),
            error,
        });
    }

    fn read_state<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn apply(
        &self,
        kind: WriteKind,
        path: String,
        value: Value,
        writes: Vec<(Vec<String>, Value)>,
    ) -> Result<(), StoreError> {
        self.take_failure()?;
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            for (location, child) in writes {
                state.root.set_path(&location.join("/"), child);
            }
            debug!("Memory store {:?} at '{}'", kind, path);
            state.writes.push(RecordedWrite { kind, path, value });
        }
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        // No receivers is fine
        let _ = self.change_tx.send(StoreEvent::Changed);
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        reject_absent(&value)?;
        let location = segments(path);
        self.apply(
            WriteKind::Set,
            normalize_path(path),
            value.clone(),
            vec![(location, value)],
        )
    }

    async fn update(&self, path: &str, value: Value) -> Result<(), StoreError> {
        reject_absent(&value)?;
        let children = match &value {
            Value::Object(children) => children.clone(),
            other => {
                return Err(StoreError::InvalidData {
                    message: format!("update expects an object, got {}", other.kind()),
                })
            }
        };

        let base = segments(path);
        let writes = children
            .into_iter()
            .map(|(key, child)| {
                let mut location = base.clone();
                location.extend(segments(&key));
                (location, child)
            })
            .collect();
        self.apply(WriteKind::Update, normalize_path(path), value, writes)
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        reject_absent(&value)?;
        let key = self
            .push_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_id();

        let mut location = segments(path);
        location.push(key.clone());
        let full_path = location.join("/");
        self.apply(WriteKind::Push, full_path, value.clone(), vec![(location, value)])?;
        Ok(key)
    }

    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        self.take_failure()?;
        let location = segments(path);
        Ok(self.read_state(|state| read_at(&state.root, &location)))
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.apply(
            WriteKind::Remove,
            normalize_path(path),
            Value::Null,
            vec![(segments(path), Value::Null)],
        )
    }

    fn subscribe(&self, path: &str) -> ValueStream {
        let watch = Watch {
            rx: self.change_tx.subscribe(),
            state: Arc::clone(&self.state),
            location: segments(path),
            last: None,
        };

        Box::pin(futures::stream::unfold(watch, |mut watch| async move {
            if watch.last.is_none() {
                let current = watch.current();
                watch.last = Some(current.clone());
                return Some((Ok(current), watch));
            }

            loop {
                match watch.rx.recv().await {
                    Ok(StoreEvent::Changed) => {
                        if let Some(value) = watch.changed() {
                            return Some((Ok(value), watch));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Subscription lagged by {} events", n);
                        if let Some(value) = watch.changed() {
                            return Some((Ok(value), watch));
                        }
                    }
                    Ok(StoreEvent::Failed { path, error }) => {
                        if path == watch.location.join("/") {
                            return Some((Err(error), watch));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

struct Watch {
    rx: broadcast::Receiver<StoreEvent>,
    state: Arc<RwLock<StoreState>>,
    location: Vec<String>,
    last: Option<Value>,
}

impl Watch {
    fn current(&self) -> Value {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        read_at(&state.root, &self.location)
    }

    /// The current value, if it differs from the last one delivered.
    fn changed(&mut self) -> Option<Value> {
        let current = self.current();
        if self.last.as_ref() == Some(&current) {
            return None;
        }
        self.last = Some(current.clone());
        Some(current)
    }
}

fn reject_absent(value: &Value) -> Result<(), StoreError> {
    if contains_absent(value) {
        return Err(StoreError::InvalidData {
            message: "value contains an absent field".to_string(),
        });
    }
    Ok(())
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| segment.trim().to_string())
        .collect()
}

fn normalize_path(path: &str) -> String {
    segments(path).join("/")
}

fn read_at(root: &Value, location: &[String]) -> Value {
    root.pointer(&location.join("/"))
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_set_get_and_prune() {
        let store = MemoryStore::new();
        store
            .set("users/1", Value::from(json!({"name": "Ann", "tags": {}})))
            .await
            .unwrap();

        assert_eq!(
            store.get("users").await.unwrap(),
            Value::from(json!({"1": {"name": "Ann"}}))
        );

        store.remove("users/1/name").await.unwrap();
        assert_eq!(store.get("users").await.unwrap(), Value::Null);
        assert_eq!(store.snapshot(), Value::Null);
    }

    #[tokio::test]
    async fn test_update_merges_children() {
        let store = MemoryStore::new();
        store.seed("p", Value::from(json!({"a": 1, "b": 2}))).unwrap();

        store
            .update("p", Value::from(json!({"b": 3, "c": {"d": 4}, "a": null})))
            .await
            .unwrap();

        assert_eq!(
            store.get("p").await.unwrap(),
            Value::from(json!({"b": 3, "c": {"d": 4}}))
        );
        assert_eq!(store.writes()[0].kind, WriteKind::Update);
    }

    #[tokio::test]
    async fn test_array_children_are_addressable() {
        let store = MemoryStore::new();
        store
            .set("users/ann", Value::from(json!({"tags": ["a", "b"]})))
            .await
            .unwrap();

        assert_eq!(store.get("users/ann/tags/0").await.unwrap(), Value::from("a"));

        store
            .update("users/ann", Value::from(json!({"tags/1": "x"})))
            .await
            .unwrap();
        assert_eq!(
            store.get("users/ann").await.unwrap(),
            Value::from(json!({"tags": ["a", "x"]}))
        );

        let mut stream = store.subscribe("users/ann/tags/1");
        assert_eq!(stream.next().await, Some(Ok(Value::from("x"))));
    }

    #[tokio::test]
    async fn test_push_generates_ordered_keys() {
        let store = MemoryStore::new();
        let first = store.push("log", Value::from(1)).await.unwrap();
        let second = store.push("log", Value::from(2)).await.unwrap();

        assert!(first < second);
        assert_eq!(store.get(&format!("log/{second}")).await.unwrap(), Value::from(2));
        assert_eq!(store.writes()[1].path, format!("log/{second}"));
    }

    #[tokio::test]
    async fn test_absent_values_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .set("x", Value::object([("a", Value::Absent)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData { .. }));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let store = MemoryStore::new();
        store.fail_next(StoreError::network("offline"));

        assert_eq!(
            store.set("x", Value::from(1)).await.unwrap_err(),
            StoreError::network("offline")
        );
        store.set("x", Value::from(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_emits_current_then_changes() {
        let store = MemoryStore::new();
        store.seed("counter", Value::from(1)).unwrap();
        let mut stream = store.subscribe("counter");

        assert_eq!(stream.next().await, Some(Ok(Value::from(1))));

        store.set("unrelated", Value::from(true)).await.unwrap();
        store.set("counter", Value::from(2)).await.unwrap();
        assert_eq!(stream.next().await, Some(Ok(Value::from(2))));

        store.inject_subscription_error("/counter/", StoreError::network("dropped"));
        assert_eq!(stream.next().await, Some(Err(StoreError::network("dropped"))));
    }
}
