//! LMDB-backed durable store.
//!
//! Uses the heed crate (Rust bindings for LMDB) so cached credentials and
//! stock records survive a coordinator restart.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`
//! - Write transactions for `put`
//! - Statistics are tracked with atomic counters

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use stockroom_core::{StockroomResult, StorageError};

use crate::store::DurableStore;

/// Error type for opening the LMDB environment.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for stockroom_core::StockroomError {
    fn from(e: LmdbStoreError) -> Self {
        StorageError::Open {
            reason: e.to_string(),
        }
        .into()
    }
}

/// Read/write counters for the LMDB store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LmdbStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// LMDB-backed durable store.
///
/// # Example
///
/// ```ignore
/// use stockroom_storage::{LmdbDurableStore, write_json, TOKEN_KEY};
///
/// let store = LmdbDurableStore::new("/var/lib/stockroom", 64)?;
/// write_json(&store, TOKEN_KEY, &credential).await?;
/// ```
pub struct LmdbDurableStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Str, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl LmdbDurableStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this
        // process and never mapped twice.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb.max(1) * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "LMDB durable store opened");

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub fn stats(&self) -> LmdbStoreStats {
        LmdbStoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    fn read_error(key: &str, e: impl std::fmt::Display) -> StorageError {
        StorageError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        }
    }

    fn write_error(key: &str, e: impl std::fmt::Display) -> StorageError {
        StorageError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl DurableStore for LmdbDurableStore {
    async fn get(&self, key: &str) -> StockroomResult<Option<Vec<u8>>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| Self::read_error(key, e))?;

        match self.db.get(&rtxn, key) {
            Ok(Some(bytes)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(bytes.to_vec()))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(Self::read_error(key, e).into())
            }
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StockroomResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| Self::write_error(key, e))?;

        self.db
            .put(&mut wtxn, key, &value)
            .map_err(|e| Self::write_error(key, e))?;

        wtxn.commit().map_err(|e| Self::write_error(key, e))?;

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for LmdbDurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbDurableStore")
            .field("path", &self.env.path())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{stock_key, TOKEN_KEY};
    use crate::store::{read_json, write_json};
    use chrono::Utc;
    use std::time::Duration;
    use stockroom_core::{CacheRecord, Credential, StockEntry};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> LmdbDurableStore {
        LmdbDurableStore::new(dir.path(), 10).expect("open LMDB store")
    }

    #[tokio::test]
    async fn test_get_missing_counts_miss() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        assert_eq!(store.get("absent").await.unwrap(), None);
        assert_eq!(store.stats().misses, 1);
        assert_eq!(store.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        store.put("k", b"value".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));

        let stats = store.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let credential = Credential::from_lifetime("tok", Utc::now(), 3600);
        let record = CacheRecord::new(StockEntry::new("A", 9), Utc::now(), Duration::from_secs(60));

        {
            let store = open(&dir);
            write_json(&store, TOKEN_KEY, &credential).await.unwrap();
            write_json(&store, &stock_key("A"), &record).await.unwrap();
        }

        let reopened = open(&dir);
        let restored: Option<Credential> = read_json(&reopened, TOKEN_KEY).await.unwrap();
        let restored_record: Option<CacheRecord<StockEntry>> =
            read_json(&reopened, &stock_key("A")).await.unwrap();

        assert_eq!(restored, Some(credential));
        assert_eq!(restored_record, Some(record));
    }

    #[test]
    fn test_open_error_converts_to_storage_error() {
        let err: stockroom_core::StockroomError = LmdbStoreError::EnvOpen("denied".into()).into();
        assert!(matches!(
            err,
            stockroom_core::StockroomError::Storage(StorageError::Open { .. })
        ));
    }
}
