//! Realtime data store port
//!
//! The call layer persists everything in a hierarchical JSON tree addressed by
//! slash-separated paths. Writes are atomic per path, keys for appended
//! children are generated client-side and sort chronologically, and any path
//! can be watched as a stream of snapshots.

pub mod memory;
pub mod path;
pub mod push_id;

pub use memory::MemoryDataStore;
pub use path::{child_path, validate_path};
pub use push_id::PushIdGenerator;

use crate::domain::shared::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Value of a node at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Last segment of the node's path
    pub key: String,
    /// `None` when nothing is stored at the path
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }
}

/// Port to the realtime database
#[async_trait]
pub trait RemoteDataStore: Send + Sync {
    /// Generate a unique key that sorts after every key generated before it
    fn push_key(&self) -> String;

    /// Read the node at `path` once
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the node at `path`. Writing `null` removes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge `fields` into the node at `path`; `null` fields are removed
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete the node at `path`. Deleting a missing node succeeds.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Children of `path` ordered by the value of their `field` child, ties
    /// broken by key
    async fn query_ordered_by_child(
        &self,
        path: &str,
        field: &str,
    ) -> Result<Vec<Snapshot>, StoreError>;

    /// Watch `path`. The stream yields the current snapshot when first
    /// polled and a fresh one after every change at or below `path`. It never
    /// ends on its own; drop it to unsubscribe.
    fn subscribe(&self, path: &str) -> BoxStream<'static, Result<Snapshot, StoreError>>;

    /// Append `value` under a new push key and return the key
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = self.push_key();
        self.set(&child_path(path, &key), value).await?;
        Ok(key)
    }
}
