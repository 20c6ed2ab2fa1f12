//! Durable store trait and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use stockroom_core::{StockroomResult, StorageError};
use tokio::sync::RwLock;

/// Per-instance persistent key-value store.
///
/// Each call is atomic on its own; no multi-key transactions are needed.
/// The coordinator is the only writer.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read the raw value for `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StockroomResult<Option<Vec<u8>>>;

    /// Replace the value for `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> StockroomResult<()>;
}

/// Read and decode a JSON value.
///
/// Absent keys yield `Ok(None)`. Undecodable bytes are reported as
/// [`StorageError::Serialization`]; callers that treat them as a miss
/// decide that themselves.
pub async fn read_json<T>(store: &dyn DurableStore, key: &str) -> StockroomResult<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(bytes) = store.get(key).await? else {
        return Ok(None);
    };

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Encode `value` as JSON and write it.
pub async fn write_json<T>(store: &dyn DurableStore, key: &str, value: &T) -> StockroomResult<()>
where
    T: Serialize + Sync,
{
    let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.put(key, bytes).await
}

/// In-memory durable store.
///
/// Survives nothing beyond the process, which is enough for tests and for
/// running the coordinator without a disk.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, key: &str) -> StockroomResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StockroomResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
