//! JSON file key-value store
//!
//! All keys live in a single JSON object. Every mutation rewrites the file
//! through a temporary sibling followed by a rename, so a reader sees either the
//! previous contents or the new ones.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::error::StorageError;

use super::KeyValueStore;

/// File-backed store
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
    max_bytes: Option<usize>,
}

impl FileStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty store; it is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                warn!("Storage file {} is empty, starting with no keys", path.display());
                BTreeMap::new()
            } else {
                serde_json::from_str::<BTreeMap<String, String>>(&content)?
            }
        } else {
            debug!("Storage file {} not found, starting empty", path.display());
            BTreeMap::new()
        };

        info!("Opened storage file {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            max_bytes: None,
        })
    }

    /// Limit the serialized file size
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` to disk, checking the quota first
    fn persist(&self, entries: &BTreeMap<String, String>, key: &str) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(limit) = self.max_bytes {
            if json.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    limit,
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path)?;

        // Owner read/write only, set before any secret lands in the file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(0o600);
            file.set_permissions(perms)?;
        }

        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Apply `mutate` to a copy of the entries, persist, then publish
    fn mutate<F>(&self, key: &str, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::Io("file store lock poisoned".to_string()))?;

        let mut next = entries.clone();
        mutate(&mut next);
        self.persist(&next, key)?;
        *entries = next;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::Io("file store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(key, |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(key, |entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate("*", |entries| entries.clear())
    }
}
