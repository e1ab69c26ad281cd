//! In-process implementation of the realtime data store
//!
//! Mirrors the hosted database's tree semantics: `null` never gets stored,
//! empty parents disappear, server timestamps are resolved at commit and
//! watchers see a snapshot after every change that touches their path.

use super::path::validate_path;
use super::push_id::PushIdGenerator;
use super::{RemoteDataStore, Snapshot};
use crate::domain::shared::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

struct Inner {
    root: RwLock<Value>,
    changes: broadcast::Sender<Vec<String>>,
    push_ids: PushIdGenerator,
    offline: AtomicBool,
    writes: AtomicU64,
    write_delay_ms: AtomicU64,
}

/// Cheap to clone; clones share the same tree
#[derive(Clone)]
pub struct MemoryDataStore {
    inner: Arc<Inner>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Value::Null),
                changes,
                push_ids: PushIdGenerator::new(),
                offline: AtomicBool::new(false),
                writes: AtomicU64::new(0),
                write_delay_ms: AtomicU64::new(0),
            }),
        }
    }

    /// While offline every operation fails with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
        debug!("Memory store offline={}", offline);
    }

    /// Hold every write for `delay` before committing it, like a slow link
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.write_delay_ms.store(millis, AtomicOrdering::SeqCst);
    }

    /// Number of committed writes (set, update, remove, push)
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(AtomicOrdering::SeqCst)
    }

    /// Copy of the whole tree
    pub async fn dump(&self) -> Value {
        self.inner.root.read().await.clone()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    async fn write_latency(&self) {
        let millis = self.inner.write_delay_ms.load(AtomicOrdering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn committed(&self, segments: Vec<String>) {
        self.inner.writes.fetch_add(1, AtomicOrdering::SeqCst);
        // No watchers is fine
        let _ = self.inner.changes.send(segments);
    }

    async fn snapshot(&self, segments: &[String]) -> Result<Snapshot, StoreError> {
        self.ensure_online()?;
        let root = self.inner.root.read().await;
        let value = node_at(&root, segments).cloned();
        Ok(Snapshot {
            key: segments.last().cloned().unwrap_or_default(),
            value,
        })
    }
}

impl Default for MemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteDataStore for MemoryDataStore {
    fn push_key(&self) -> String {
        self.inner.push_ids.generate()
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = owned_segments(path)?;
        Ok(self.snapshot(&segments).await?.value)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_online()?;
        let segments = owned_segments(path)?;
        self.write_latency().await;
        let value = prepare(value, Utc::now().timestamp_millis());

        {
            let mut root = self.inner.root.write().await;
            write_at(&mut root, &segments, value);
        }

        debug!("set {}", path);
        self.committed(segments);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.ensure_online()?;
        let base = owned_segments(path)?;
        self.write_latency().await;
        let now = Utc::now().timestamp_millis();

        let mut writes = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            let mut segments = base.clone();
            segments.extend(owned_segments(&field)?);
            writes.push((segments, prepare(value, now)));
        }

        {
            let mut root = self.inner.root.write().await;
            for (segments, value) in writes {
                write_at(&mut root, &segments, value);
            }
        }

        debug!("update {}", path);
        self.committed(base);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        let segments = owned_segments(path)?;
        self.write_latency().await;

        {
            let mut root = self.inner.root.write().await;
            write_at(&mut root, &segments, Value::Null);
        }

        debug!("remove {}", path);
        self.committed(segments);
        Ok(())
    }

    async fn query_ordered_by_child(
        &self,
        path: &str,
        field: &str,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let segments = owned_segments(path)?;
        let snapshot = self.snapshot(&segments).await?;

        let mut children: Vec<Snapshot> = match snapshot.value {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| Snapshot {
                    key,
                    value: Some(value),
                })
                .collect(),
            _ => Vec::new(),
        };

        children.sort_by(|a, b| {
            let left = a.value.as_ref().and_then(|v| v.get(field));
            let right = b.value.as_ref().and_then(|v| v.get(field));
            compare_values(left, right).then_with(|| a.key.cmp(&b.key))
        });

        Ok(children)
    }

    fn subscribe(&self, path: &str) -> BoxStream<'static, Result<Snapshot, StoreError>> {
        let segments = match owned_segments(path) {
            Ok(segments) => segments,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let rx = self.inner.changes.subscribe();
        let store = self.clone();

        stream::unfold(
            (store, rx, segments, true),
            |(store, mut rx, segments, first)| async move {
                if first {
                    let snapshot = store.snapshot(&segments).await;
                    return Some((snapshot, (store, rx, segments, false)));
                }

                loop {
                    match rx.recv().await {
                        Ok(changed) if overlaps(&changed, &segments) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Watcher lagged by {} changes, resyncing", skipped);
                            break;
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }

                let snapshot = store.snapshot(&segments).await;
                Some((snapshot, (store, rx, segments, false)))
            },
        )
        .boxed()
    }
}

fn owned_segments(path: &str) -> Result<Vec<String>, StoreError> {
    Ok(validate_path(path)?
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// True when one path is an ancestor of (or equal to) the other
fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn node_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

/// Store `value` at `segments`, creating parents as needed. A `Null` value
/// removes the node and prunes parents left empty.
fn write_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if value.is_null() && !node.is_object() {
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        if rest.is_empty() {
            if value.is_null() {
                map.remove(head);
            } else {
                map.insert(head.clone(), value);
            }
        } else {
            let child = map.entry(head.clone()).or_insert(Value::Null);
            write_at(child, rest, value);
            if child.is_null() {
                map.remove(head);
            }
        }

        if map.is_empty() {
            *node = Value::Null;
        }
    }
}

/// Resolve server placeholders and strip nulls and empty objects
fn prepare(value: Value, now_millis: i64) -> Value {
    match value {
        Value::Object(map) if is_server_timestamp(&map) => Value::from(now_millis),
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prepare(v, now_millis)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        other => other,
    }
}

fn is_server_timestamp(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp")
}

/// Child ordering: missing, false, true, numbers, strings, objects
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(false)) => 1,
            Some(Value::Bool(true)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryDataStore::new();
        store.set("Calls/c1", json!({ "status": "outgoing" })).await.unwrap();

        assert_eq!(
            store.get("Calls/c1").await.unwrap(),
            Some(json!({ "status": "outgoing" }))
        );
        assert_eq!(store.get("Calls/c2").await.unwrap(), None);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_set_null_removes_and_prunes() {
        let store = MemoryDataStore::new();
        store.set("ActiveCalls/u1", json!({ "callId": "c1" })).await.unwrap();
        store.set("ActiveCalls/u1", Value::Null).await.unwrap();

        assert_eq!(store.get("ActiveCalls").await.unwrap(), None);
        assert_eq!(store.dump().await, Value::Null);
    }

    #[tokio::test]
    async fn test_set_drops_null_fields() {
        let store = MemoryDataStore::new();
        store
            .set("Calls/c1", json!({ "status": "outgoing", "endTime": null }))
            .await
            .unwrap();

        assert_eq!(
            store.get("Calls/c1").await.unwrap(),
            Some(json!({ "status": "outgoing" }))
        );
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryDataStore::new();
        store
            .set("Calls/c1", json!({ "status": "outgoing", "callerId": "u1" }))
            .await
            .unwrap();

        let fields = json!({ "status": "ended", "duration": 5 })
            .as_object()
            .cloned()
            .unwrap();
        store.update("Calls/c1", fields).await.unwrap();

        assert_eq!(
            store.get("Calls/c1").await.unwrap(),
            Some(json!({ "status": "ended", "callerId": "u1", "duration": 5 }))
        );
    }

    #[tokio::test]
    async fn test_update_missing_node_creates_it() {
        let store = MemoryDataStore::new();
        let fields = json!({ "status": "connected" }).as_object().cloned().unwrap();
        store.update("ActiveCalls/u9", fields).await.unwrap();

        assert_eq!(
            store.get("ActiveCalls/u9").await.unwrap(),
            Some(json!({ "status": "connected" }))
        );
    }

    #[tokio::test]
    async fn test_server_timestamp_resolved_on_write() {
        let store = MemoryDataStore::new();
        let before = Utc::now().timestamp_millis();
        store
            .set("Calls/c1", json!({ "startTime": { ".sv": "timestamp" } }))
            .await
            .unwrap();
        let after = Utc::now().timestamp_millis();

        let stored = store.get("Calls/c1/startTime").await.unwrap().unwrap();
        let millis = stored.as_i64().unwrap();
        assert!(millis >= before && millis <= after);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let store = MemoryDataStore::new();
        store.remove("ActiveCalls/nobody").await.unwrap();
        assert_eq!(store.dump().await, Value::Null);
    }

    #[tokio::test]
    async fn test_push_generates_ordered_keys() {
        let store = MemoryDataStore::new();
        let first = store.push("CallHistory/u1", json!({ "n": 1 })).await.unwrap();
        let second = store.push("CallHistory/u1", json!({ "n": 2 })).await.unwrap();

        assert!(first < second);
        assert_eq!(
            store.get(&format!("CallHistory/u1/{}", second)).await.unwrap(),
            Some(json!({ "n": 2 }))
        );
    }

    #[tokio::test]
    async fn test_query_ordered_by_child() {
        let store = MemoryDataStore::new();
        store.set("H/u1/b", json!({ "timestamp": 30 })).await.unwrap();
        store.set("H/u1/a", json!({ "timestamp": 10 })).await.unwrap();
        store.set("H/u1/c", json!({ "timestamp": 20 })).await.unwrap();
        store.set("H/u1/d", json!({ "other": 1 })).await.unwrap();

        let keys: Vec<String> = store
            .query_ordered_by_child("H/u1", "timestamp")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();

        assert_eq!(keys, vec!["d", "a", "c", "b"]);
        assert!(store.query_ordered_by_child("H/none", "timestamp").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let store = MemoryDataStore::new();
        store.set_offline(true);

        assert!(matches!(
            store.set("Calls/c1", json!(1)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(store.get("Calls/c1").await, Err(StoreError::Unavailable(_))));
        assert_eq!(store.write_count(), 0);

        store.set_offline(false);
        store.set("Calls/c1", json!(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_delay_holds_commit() {
        let store = MemoryDataStore::new();
        store.set_write_delay(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        store.set("Calls/c1", json!({ "status": "outgoing" })).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(store.write_count(), 1);

        // Reads are not delayed
        let started = tokio::time::Instant::now();
        assert!(store.get("Calls/c1").await.unwrap().is_some());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_invalid_path_rejected() {
        let store = MemoryDataStore::new();
        assert!(matches!(
            store.set("Calls/a.b", json!(1)).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_yields_current_then_changes() {
        let store = MemoryDataStore::new();
        store.set("ActiveCalls/u1", json!({ "status": "outgoing" })).await.unwrap();

        let mut watch = store.subscribe("ActiveCalls/u1");
        let first = watch.next().await.unwrap().unwrap();
        assert_eq!(first.key, "u1");
        assert_eq!(first.value, Some(json!({ "status": "outgoing" })));

        // Unrelated path: no snapshot
        store.set("ActiveCalls/u2", json!({ "status": "outgoing" })).await.unwrap();
        store.set("ActiveCalls/u1/status", json!("connected")).await.unwrap();
        let second = watch.next().await.unwrap().unwrap();
        assert_eq!(second.value, Some(json!({ "status": "connected" })));

        store.remove("ActiveCalls").await.unwrap();
        let third = watch.next().await.unwrap().unwrap();
        assert!(!third.exists());

        let pending = tokio::time::timeout(Duration::from_millis(50), watch.next()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_is_restartable() {
        let store = MemoryDataStore::new();
        store.set("ActiveCalls/u1", json!({ "status": "outgoing" })).await.unwrap();

        let first = store.subscribe("ActiveCalls/u1").next().await.unwrap().unwrap();
        let again = store.subscribe("ActiveCalls/u1").next().await.unwrap().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_compare_values_order() {
        let values = [
            json!("a"),
            json!(2),
            json!(true),
            json!({ "x": 1 }),
            json!(false),
            json!(-1.5),
        ];
        let mut refs: Vec<Option<&Value>> = values.iter().map(Some).collect();
        refs.push(None);
        refs.sort_by(|a, b| compare_values(*a, *b));

        let rendered: Vec<String> = refs
            .iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()))
            .collect();
        assert_eq!(
            rendered,
            vec!["-", "false", "true", "-1.5", "2", "\"a\"", "{\"x\":1}"]
        );
    }
}
