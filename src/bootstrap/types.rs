//! Bootstrap state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InitError, StorageError};

/// Lifecycle stage of wallet bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    /// Checking for an existing record, or waiting for setup input
    #[default]
    Init,
    /// Wallet initialization in progress (or failed and awaiting retry)
    SettingUp,
    /// Wallet is ready
    Done,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStage::Init => write!(f, "init"),
            LoadStage::SettingUp => write!(f, "setting_up"),
            LoadStage::Done => write!(f, "done"),
        }
    }
}

/// What failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    Storage,
    Initialization,
}

/// Error flag shown to the user until acknowledged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapError {
    pub message: String,
    pub occurred_during: LoadStage,
    pub source: FailureSource,
    pub occurred_at: DateTime<Utc>,
}

impl BootstrapError {
    pub fn storage(err: &StorageError, during: LoadStage) -> Self {
        Self {
            message: err.to_string(),
            occurred_during: during,
            source: FailureSource::Storage,
            occurred_at: Utc::now(),
        }
    }

    pub fn initialization(err: &InitError) -> Self {
        Self {
            message: err.to_string(),
            occurred_during: LoadStage::SettingUp,
            source: FailureSource::Initialization,
            occurred_at: Utc::now(),
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (during {})", self.message, self.occurred_during)
    }
}

/// Snapshot published to subscribers on every change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BootstrapState {
    pub stage: LoadStage,
    pub error: Option<BootstrapError>,
    /// No record was found and the user must go through setup
    pub needs_setup: bool,
    /// Identifier of the latest attempt
    pub attempt: u64,
}

impl BootstrapState {
    /// Wallet usable
    pub fn is_ready(&self) -> bool {
        self.stage == LoadStage::Done
    }
}

/// How a bootstrap attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Wallet initialized; stage is `Done`
    Ready,
    /// Initialization failed; stage stays `SettingUp` with the error flag set
    Failed(InitError),
    /// A newer attempt (or reset) took over; this result was discarded
    Superseded,
    /// The record could not be written; nothing was initialized
    NotPersisted(StorageError),
    /// Nothing stored; setup input is required
    NeedsSetup,
}

impl AttemptOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, AttemptOutcome::Ready)
    }
}
