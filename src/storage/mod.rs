//! Fail-soft key-value storage
//!
//! The wallet keeps its small amount of persistent state in a string-keyed,
//! string-valued store. The substrate behind it may be missing entirely
//! (non-interactive context), disabled, or out of quota. [`SafeStorage`] turns
//! every one of those cases into an empty read or a typed [`StorageError`] and
//! logs the failure; nothing escapes as a panic.
//!
//! # Architecture
//!
//! ```text
//! RecordStore → SafeStorage → dyn KeyValueStore
//!                                 ├── MemoryStore
//!                                 └── FileStore
//! ```

pub mod file;
pub mod memory;

use std::sync::Arc;

use tracing::warn;

use crate::error::StorageError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage substrate
///
/// Implementations report failures through the return value. They are called from
/// synchronous code and must not block on async work.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `Ok(None)` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key
    fn clear(&self) -> Result<(), StorageError>;
}

/// Fail-soft adapter over a [`KeyValueStore`]
///
/// Cheap to clone; clones share the same substrate.
#[derive(Clone)]
pub struct SafeStorage {
    backend: Option<Arc<dyn KeyValueStore>>,
}

impl SafeStorage {
    /// Wrap a substrate
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Adapter with no substrate behind it
    ///
    /// Every read is empty and every write reports [`StorageError::Unavailable`].
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Whether a substrate is attached
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Read a value; failures are logged and read as absent
    pub fn get(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("storage get failed for key \"{}\": {}", key, e);
                None
            }
        }
    }

    /// Write a value
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let backend = self.backend.as_ref().ok_or(StorageError::Unavailable)?;
        backend.set(key, value).inspect_err(|e| {
            warn!("storage set failed for key \"{}\": {}", key, e);
        })
    }

    /// Remove a key
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let backend = self.backend.as_ref().ok_or(StorageError::Unavailable)?;
        backend.remove(key).inspect_err(|e| {
            warn!("storage remove failed for key \"{}\": {}", key, e);
        })
    }

    /// Remove every key
    pub fn clear(&self) -> Result<(), StorageError> {
        let backend = self.backend.as_ref().ok_or(StorageError::Unavailable)?;
        backend.clear().inspect_err(|e| {
            warn!("storage clear failed: {}", e);
        })
    }
}

impl std::fmt::Debug for SafeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeStorage")
            .field("available", &self.is_available())
            .finish()
    }
}
