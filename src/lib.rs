//! Wallet Bootstrap Library
//!
//! Classifies wallet setup input, persists the resulting credential record
//! fail-soft, and drives the wallet through its load stages.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use bootstrap::{Bootstrapper, BootstrapState, LoadStage, WalletInitializer};
pub use config::Config;
pub use credential::{classify, CredentialKind, CredentialRecord};
pub use error::{Error, Result};
pub use storage::SafeStorage;
