//! In-memory key-value store
//!
//! Used as the default substrate for ephemeral sessions and throughout the tests.
//! It can be told to fail (unavailable substrate, failing key, byte quota) so the
//! fail-soft paths above it can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use crate::error::StorageError;

use super::KeyValueStore;

/// In-memory store backed by a `HashMap`
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    failing_keys: RwLock<HashSet<String>>,
    quota_bytes: Option<usize>,
    write_log: Mutex<Vec<String>>,
}

impl MemoryStore {
    /// Create an empty store with no quota
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing_keys: RwLock::new(HashSet::new()),
            quota_bytes: None,
            write_log: Mutex::new(Vec::new()),
        }
    }

    /// Create an empty store that refuses writes beyond `bytes` of keys + values
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::new()
        }
    }

    /// Toggle availability of the whole store
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent `set` of `key` fail with an I/O error
    pub fn fail_writes_to(&self, key: &str) {
        if let Ok(mut keys) = self.failing_keys.write() {
            keys.insert(key.to_string());
        }
    }

    /// Mutations applied so far, oldest first (`set:<key>`, `remove:<key>`, `clear`)
    pub fn write_log(&self) -> Vec<String> {
        self.write_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if no keys are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn log(&self, op: String) {
        if let Ok(mut log) = self.write_log.lock() {
            log.push(op);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Io("memory store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_available()?;
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_available()?;

        if self.failing_keys.read().map_err(poisoned)?.contains(key) {
            return Err(StorageError::Io(format!("write to '{}' failed", key)));
        }

        let mut entries = self.entries.write().map_err(poisoned)?;

        if let Some(limit) = self.quota_bytes {
            let current: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    limit,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        drop(entries);

        self.log(format!("set:{}", key));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.entries.write().map_err(poisoned)?.remove(key);
        self.log(format!("remove:{}", key));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.entries.write().map_err(poisoned)?.clear();
        self.log("clear".to_string());
        Ok(())
    }
}
