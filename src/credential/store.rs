//! Credential record persistence
//!
//! The record is spread over three keys. Writes are ordered so that a completed
//! record is only ever visible when all three keys belong to it:
//!
//! ```text
//! remove setup_completed → set user_secret → set wallet_type → set setup_completed
//! ```

use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::storage::SafeStorage;

use super::types::{CredentialKind, CredentialRecord};

/// Key holding the credential kind tag
pub const KIND_KEY: &str = "wallet_type";

/// Key holding the raw secret or address
pub const VALUE_KEY: &str = "user_secret";

/// Key holding the completion flag
pub const COMPLETED_KEY: &str = "setup_completed";

/// Key written by the profile flow once a profile exists
pub const PROFILE_STAGE_KEY: &str = "profile_setup_stage";

const COMPLETED: &str = "true";

/// Persists the single canonical credential record
#[derive(Debug, Clone)]
pub struct RecordStore {
    storage: SafeStorage,
}

impl RecordStore {
    /// Create a record store on top of `storage`
    pub fn new(storage: SafeStorage) -> Self {
        Self { storage }
    }

    /// Underlying storage adapter
    pub fn storage(&self) -> &SafeStorage {
        &self.storage
    }

    /// Persist `record`, replacing any previous one
    ///
    /// Stops at the first failing write. Because the completion flag is removed
    /// before anything else is touched and written last, a failure never leaves a
    /// completed record with mismatched fields behind.
    pub fn save(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        if !record.kind.is_persistable() {
            return Err(StorageError::InvalidRecord(format!(
                "{} credentials cannot be persisted",
                record.kind
            )));
        }

        self.storage.remove(COMPLETED_KEY)?;
        self.storage.set(VALUE_KEY, &record.secret_or_address)?;
        self.storage.set(KIND_KEY, record.kind.as_str())?;

        if record.setup_completed {
            self.storage.set(COMPLETED_KEY, COMPLETED)?;
        }

        info!("Saved {} credential record", record.kind);
        Ok(())
    }

    /// Load the completed record, if any
    ///
    /// Never returns a record with `setup_completed = false`.
    pub fn load(&self) -> Option<CredentialRecord> {
        match self.storage.get(COMPLETED_KEY).as_deref() {
            Some(COMPLETED) => {}
            Some(other) => {
                debug!("Setup not completed (flag = {:?})", other);
                return None;
            }
            None => {
                debug!("No credential record stored");
                return None;
            }
        }

        let Some(tag) = self.storage.get(KIND_KEY) else {
            warn!("Completion flag set but {} is missing", KIND_KEY);
            return None;
        };

        let kind = match tag.parse::<CredentialKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Ignoring stored credential record: {}", e);
                return None;
            }
        };

        let Some(value) = self.storage.get(VALUE_KEY) else {
            warn!("Completion flag set but {} is missing", VALUE_KEY);
            return None;
        };

        Some(CredentialRecord {
            kind,
            secret_or_address: value,
            setup_completed: true,
        })
    }

    /// Check if a completed record is stored
    pub fn has_record(&self) -> bool {
        self.load().is_some()
    }

    /// Remove the record
    ///
    /// The completion flag goes first. Every key is attempted; the first failure
    /// is reported.
    pub fn clear(&self) -> Result<(), StorageError> {
        let results = [
            self.storage.remove(COMPLETED_KEY),
            self.storage.remove(KIND_KEY),
            self.storage.remove(VALUE_KEY),
        ];

        match results.into_iter().find_map(Result::err) {
            Some(e) => Err(e),
            None => {
                info!("Cleared credential record");
                Ok(())
            }
        }
    }

    /// Stage reached by the profile flow, if it ever started
    pub fn profile_setup_stage(&self) -> Option<String> {
        self.storage.get(PROFILE_STAGE_KEY)
    }
}
