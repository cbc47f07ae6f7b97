//! Persistence gateway
//!
//! Best-effort JSON persistence of conversations, message logs and session
//! settings under a fixed key namespace. Nothing here is a source of truth:
//! `load` falls back to a caller-supplied default on any failure, and callers
//! treat `save` errors as log-and-continue. `try_load` exposes the typed
//! outcome for callers that need to tell a fallback from a stored value.

use crate::config::StorageConfig;
use crate::error::{NeochatError, TypedResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub mod backend;
pub mod settings;

pub use backend::{KeyValueStore, MemoryStore, SledStore};
pub use settings::SessionSettings;

/// Logical record names stored under the namespace
pub mod keys {
    /// Conversation list
    pub const CHATS: &str = "chats";
    /// Message log keyed by conversation id
    pub const CHAT_MESSAGES: &str = "chatMessages";
    /// Selected model id
    pub const SELECTED_MODEL: &str = "selectedModel";
    /// Model server base URL
    pub const SERVER_URL: &str = "ollamaUrl";
}

/// Namespaced JSON gateway over an optional key-value backend
///
/// A gateway without a backend behaves as "storage unavailable": every load
/// yields its fallback and every save reports `StorageUnavailable`.
#[derive(Clone)]
pub struct PersistenceGateway {
    backend: Option<Arc<dyn KeyValueStore>>,
    namespace: String,
}

impl PersistenceGateway {
    /// Create a gateway over `backend` using `namespace` as key prefix
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend: Some(backend),
            namespace: namespace.into(),
        }
    }

    /// Create a gateway with no backend
    pub fn unavailable(namespace: impl Into<String>) -> Self {
        Self {
            backend: None,
            namespace: namespace.into(),
        }
    }

    /// Create a gateway over a fresh in-process store
    ///
    /// # Examples
    ///
    /// ```
    /// use neochat::storage::PersistenceGateway;
    ///
    /// let gateway = PersistenceGateway::in_memory("neo2_");
    /// gateway.save("answer", &42).unwrap();
    /// assert_eq!(gateway.load("answer", 0), 42);
    /// ```
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), namespace)
    }

    /// Open the on-disk store described by `config`
    ///
    /// Failure to open the store never aborts: the gateway degrades to
    /// unavailable and the problem is logged once.
    pub fn open(config: &StorageConfig) -> Self {
        let Some(path) = config.resolved_path() else {
            tracing::warn!("Could not determine a storage directory; persistence disabled");
            return Self::unavailable(config.namespace.clone());
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create storage directory {}: {}", parent.display(), e);
                return Self::unavailable(config.namespace.clone());
            }
        }

        match SledStore::open(&path) {
            Ok(store) => {
                tracing::debug!("Opened store at {}", path.display());
                Self::new(Arc::new(store), config.namespace.clone())
            }
            Err(e) => {
                tracing::warn!("{}; persistence disabled", e);
                Self::unavailable(config.namespace.clone())
            }
        }
    }

    /// Whether a backend is attached
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// The key prefix in use
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn backend(&self) -> TypedResult<&Arc<dyn KeyValueStore>> {
        self.backend
            .as_ref()
            .ok_or_else(|| NeochatError::StorageUnavailable("no backend attached".to_string()))
    }

    /// Serialize `value` as JSON and store it under the namespaced `key`
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` without a backend, `Serialization` when
    /// the value cannot be encoded, and `Storage` when the write fails
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> TypedResult<()> {
        let backend = self.backend()?;
        let bytes = serde_json::to_vec(value)?;
        backend.insert(&self.namespaced(key), bytes)
    }

    /// Read and decode the value under `key`
    ///
    /// Returns `Ok(None)` when the key is absent or holds JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` without a backend, `Storage` when the read
    /// fails, and `Serialization` when the stored bytes do not decode as `T`
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> TypedResult<Option<T>> {
        let backend = self.backend()?;
        let Some(bytes) = backend.get(&self.namespaced(key))? else {
            return Ok(None);
        };

        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Read the value under `key`, or `fallback` on absence or any failure
    pub fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(e) => {
                tracing::debug!("Using fallback for '{}': {}", key, e);
                fallback
            }
        }
    }

    /// Delete the value under `key`
    pub fn remove(&self, key: &str) -> TypedResult<()> {
        self.backend()?.remove(&self.namespaced(key))
    }

    /// Delete every key under this gateway's namespace
    pub fn clear(&self) -> TypedResult<()> {
        self.backend()?.clear_prefix(&self.namespace)
    }

    /// Store `value`, logging instead of returning a failure
    pub(crate) fn save_or_log<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.save(key, value) {
            tracing::warn!("Failed to persist '{}': {}", key, e);
        }
    }
}
