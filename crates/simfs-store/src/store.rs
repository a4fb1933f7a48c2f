//! Embedded ordered key-value store.
//!
//! Wraps a sled database with the five operations the filesystem needs:
//! put, get, delete, existence check, and ordered prefix scan. All
//! operations are synchronous; callers treat a failure as fatal for the
//! current request. Durability ordering is sled's responsibility.

use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying sled database failed.
    #[error("store I/O error: {0}")]
    Backend(#[from] sled::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Ordered key→bytes map backed by a sled database directory.
///
/// Concurrent readers and writers across distinct keys are allowed; within
/// a key the last writer wins. No cross-key transactions are offered.
#[derive(Debug, Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!("opened store at {}", path.display());
        Ok(Store { db })
    }

    /// Open a throwaway in-memory-backed database, for tests and tooling.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Store { db })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    /// Fetch the value under `key`, if any.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Whether `key` is present.
    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// All keys beginning with `prefix`, in lexicographic order.
    pub fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut found = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (key, _) = item?;
            found.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(found)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
