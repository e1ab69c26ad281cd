//! Realtime-store implementation of the call repository

use crate::config::StoreConfig;
use crate::domain::call::entity::UserProfile;
use crate::domain::call::record::{ActiveCallPointer, CallHistoryEntry, CallRecord, CallRecordPatch};
use crate::domain::call::repository::CallRepository;
use crate::domain::shared::error::StoreError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, UserId};
use crate::infrastructure::store::{child_path, RemoteDataStore};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

pub struct StoreCallRepository {
    store: Arc<dyn RemoteDataStore>,
    paths: StoreConfig,
}

impl StoreCallRepository {
    pub fn new(store: Arc<dyn RemoteDataStore>, paths: StoreConfig) -> Self {
        Self { store, paths }
    }

    fn call_path(&self, id: &CallId) -> String {
        child_path(&self.paths.calls_root, id.as_str())
    }

    fn active_path(&self, user: &UserId) -> String {
        child_path(&self.paths.active_calls_root, user.as_str())
    }

    fn history_path(&self, user: &UserId) -> String {
        child_path(&self.paths.history_root, user.as_str())
    }

    fn profile_path(&self, user: &UserId) -> String {
        child_path(&self.paths.profiles_root, user.as_str())
    }

    /// Follow the user's active-call pointer. Yields the current pointer
    /// first, then again after every change; `None` while not in a call.
    pub fn watch_active_pointer(
        &self,
        user: &UserId,
    ) -> BoxStream<'static, Result<Option<ActiveCallPointer>>> {
        let path = self.active_path(user);
        self.store
            .subscribe(&path)
            .map(move |snapshot| -> Result<Option<ActiveCallPointer>> {
                let snapshot = snapshot?;
                match snapshot.value {
                    Some(value) => Ok(Some(decode(&path, value)?)),
                    None => Ok(None),
                }
            })
            .boxed()
    }
}

fn encode<T: Serialize>(path: &str, value: &T) -> std::result::Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> std::result::Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| {
        error!("Malformed value at {}: {}", path, e);
        StoreError::Serialization {
            path: path.to_string(),
            reason: e.to_string(),
        }
    })
}

#[async_trait]
impl CallRepository for StoreCallRepository {
    async fn create_call(&self, record: &CallRecord) -> Result<CallId> {
        let id = CallId::new(self.store.push_key());
        let path = self.call_path(&id);

        self.store.set(&path, encode(&path, record)?).await?;

        debug!("Call record created: {}", id);
        Ok(id)
    }

    async fn update_call(&self, id: &CallId, patch: &CallRecordPatch) -> Result<()> {
        let path = self.call_path(id);
        let fields = match encode(&path, patch)? {
            Value::Object(fields) => fields,
            _ => serde_json::Map::new(),
        };

        self.store.update(&path, fields).await?;

        debug!("Call record {} updated: {:?}", id, patch.status);
        Ok(())
    }

    async fn get_call(&self, id: &CallId) -> Result<Option<CallRecord>> {
        let path = self.call_path(id);
        match self.store.get(&path).await? {
            Some(value) => {
                let record: CallRecord = decode(&path, value)?;
                Ok(Some(record.with_id(id.clone())))
            }
            None => Ok(None),
        }
    }

    async fn set_active_pointer(&self, user: &UserId, pointer: &ActiveCallPointer) -> Result<()> {
        let path = self.active_path(user);
        self.store.set(&path, encode(&path, pointer)?).await?;

        debug!("Active call pointer for {} set to {} ({})", user, pointer.call_id, pointer.status);
        Ok(())
    }

    async fn clear_active_pointer(&self, user: &UserId) -> Result<()> {
        self.store.remove(&self.active_path(user)).await?;

        debug!("Active call pointer for {} cleared", user);
        Ok(())
    }

    async fn get_active_pointer(&self, user: &UserId) -> Result<Option<ActiveCallPointer>> {
        let path = self.active_path(user);
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(decode(&path, value)?)),
            None => Ok(None),
        }
    }

    async fn append_history(&self, user: &UserId, entry: &CallHistoryEntry) -> Result<String> {
        let path = self.history_path(user);
        let key = self.store.push(&path, encode(&path, entry)?).await?;

        debug!("History entry {} appended for {} (call {})", key, user, entry.call_id);
        Ok(key)
    }

    async fn get_history(&self, user: &UserId) -> Result<Vec<CallHistoryEntry>> {
        let path = self.history_path(user);
        let children = self.store.query_ordered_by_child(&path, "timestamp").await?;

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let Some(value) = child.value else { continue };
            let mut entry: CallHistoryEntry = decode(&child_path(&path, &child.key), value)?;
            entry.id = Some(child.key);
            entries.push(entry);
        }

        // Oldest first from the store, newest first for callers
        entries.reverse();
        Ok(entries)
    }

    async fn get_user_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let path = self.profile_path(user);
        let Some(mut value) = self.store.get(&path).await? else {
            return Ok(None);
        };

        if let Value::Object(map) = &mut value {
            map.entry("id")
                .or_insert_with(|| Value::String(user.as_str().to_string()));
        }
        Ok(Some(decode(&path, value)?))
    }
}
