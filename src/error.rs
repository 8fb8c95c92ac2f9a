//! Error types for the bootstrap engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bootstrap engine
///
/// Configuration and CLI plumbing report through `anyhow`; this enum covers what
/// the engine itself can return.
#[derive(Error, Debug)]
pub enum Error {
    // Storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    // Wallet backend errors
    #[error(transparent)]
    Initialization(#[from] InitError),

    // Bootstrap misuse
    #[error("Nothing to retry: no setup attempt has been made")]
    NothingToRetry,

    #[error("Wallet is already set up")]
    AlreadyDone,
}

/// Failure reported by the storage layer
///
/// Storage failures are never fatal. The safe storage adapter logs them and hands
/// them back as values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage is unavailable")]
    Unavailable,

    #[error("Storage quota exceeded writing '{key}' (limit {limit} bytes)")]
    QuotaExceeded { key: String, limit: usize },

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage serialization error: {0}")]
    Serialization(String),

    #[error("Invalid credential record: {0}")]
    InvalidRecord(String),
}

/// Failure reported by the wallet backend while initializing or creating a wallet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The backend refused the credential (bad checksum, unknown words, ...)
    #[error("Credential rejected by wallet backend: {0}")]
    Rejected(String),

    /// The backend could not be reached or is not configured
    #[error("Wallet backend unavailable: {0}")]
    Unavailable(String),

    #[error("Wallet backend error: {0}")]
    Backend(String),
}

impl InitError {
    /// Check if this error is transient
    ///
    /// Used by callers to phrase the retry prompt. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InitError::Unavailable(_) | InitError::Backend(_))
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
