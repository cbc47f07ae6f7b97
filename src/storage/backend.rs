//! Key-value backends for the persistence gateway
//!
//! The gateway only needs byte-level get/insert/remove. `SledStore` keeps
//! data in an embedded `sled` database on disk; `MemoryStore` keeps it in
//! process and is used for tests and ephemeral sessions.

use crate::error::{NeochatError, TypedResult};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Byte-oriented key-value backend
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> TypedResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    fn insert(&self, key: &str, value: Vec<u8>) -> TypedResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> TypedResult<()>;

    /// Remove every key starting with `prefix`
    fn clear_prefix(&self, prefix: &str) -> TypedResult<()>;
}

/// Embedded on-disk store backed by `sled`
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `NeochatError::StorageUnavailable` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use neochat::storage::SledStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SledStore::open(dir.path().join("store")).unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> TypedResult<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            NeochatError::StorageUnavailable(format!("Failed to open database: {}", e))
        })?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> TypedResult<Option<Vec<u8>>> {
        self.db
            .get(key.as_bytes())
            .map(|value| value.map(|bytes| bytes.to_vec()))
            .map_err(|e| NeochatError::Storage(format!("Get failed: {}", e)))
    }

    fn insert(&self, key: &str, value: Vec<u8>) -> TypedResult<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| NeochatError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| NeochatError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> TypedResult<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| NeochatError::Storage(format!("Remove failed: {}", e)))?;
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> TypedResult<()> {
        let mut batch = sled::Batch::default();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) =
                entry.map_err(|e| NeochatError::Storage(format!("Scan failed: {}", e)))?;
            batch.remove(key);
        }

        self.db
            .apply_batch(batch)
            .map_err(|e| NeochatError::Storage(format!("Clear failed: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| NeochatError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// In-process store; contents vanish with the value
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> NeochatError {
    NeochatError::Storage("Memory store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> TypedResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, key: &str, value: Vec<u8>) -> TypedResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> TypedResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> TypedResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &dyn KeyValueStore) {
        assert!(store.get("missing").unwrap().is_none());

        store.insert("a", b"one".to_vec()).unwrap();
        store.insert("a", b"two".to_vec()).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"two"[..]));

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());

        store.insert("neo2_b", b"x".to_vec()).unwrap();
        store.insert("neo2_c", b"y".to_vec()).unwrap();
        store.insert("other_b", b"z".to_vec()).unwrap();
        store.clear_prefix("neo2_").unwrap();
        assert!(store.get("neo2_b").unwrap().is_none());
        assert!(store.get("neo2_c").unwrap().is_none());
        assert_eq!(store.get("other_b").unwrap().as_deref(), Some(&b"z"[..]));
    }

    #[test]
    fn test_memory_store_semantics() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sled_store_semantics() {
        let dir = tempdir().expect("failed to create tempdir");
        let store = SledStore::open(dir.path().join("store")).expect("open sled");
        exercise(&store);
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempdir().expect("failed to create tempdir");
        let path = dir.path().join("store");
        {
            let store = SledStore::open(&path).expect("open sled");
            store.insert("k", b"v".to_vec()).unwrap();
        }
        let store = SledStore::open(&path).expect("reopen sled");
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    }
}
