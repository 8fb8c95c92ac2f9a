//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::storage::{FileStore, KeyValueStore, MemoryStore, SafeStorage};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub flags: FeatureFlags,
    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Which storage substrate backs the engine
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON file on disk
    File,
    /// Process memory, lost on exit
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Path of the JSON file for the file backend
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Refuse writes that would grow the store beyond this many bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Behaviour switches passed to the bootstrap engine at construction
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Private keys and addresses complete setup without calling the wallet backend
    #[serde(default)]
    pub local_key_mode: bool,

    /// A profile/identity extension is present, so new wallets skip profile setup
    #[serde(default)]
    pub profile_extension_present: bool,

    /// Reset wipes the whole store instead of only the credential record
    #[serde(default)]
    pub reset_clears_all_storage: bool,
}

/// Navigation targets signalled by the engine
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoutesConfig {
    #[serde(default = "default_home_route")]
    pub home: String,
    #[serde(default = "default_setup_route")]
    pub setup: String,
    #[serde(default = "default_new_profile_route")]
    pub new_profile: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            home: default_home_route(),
            setup: default_setup_route(),
            new_profile: default_new_profile_route(),
        }
    }
}

// Default value functions
fn default_backend() -> StorageBackend {
    StorageBackend::File
}

fn default_storage_path() -> String {
    "wallet_state.json".to_string()
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_home_route() -> String {
    "/".to_string()
}

fn default_setup_route() -> String {
    "/setup".to_string()
}

fn default_new_profile_route() -> String {
    "/newprofile".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("storage.backend", "file")?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.max_bytes", default_max_bytes() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (BOOTSTRAP__SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("BOOTSTRAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, route) in [
            ("home", &self.routes.home),
            ("setup", &self.routes.setup),
            ("new_profile", &self.routes.new_profile),
        ] {
            if !route.starts_with('/') {
                anyhow::bail!("routes.{} must be an absolute path, got {:?}", name, route);
            }
        }

        if self.storage.backend == StorageBackend::File && self.storage.path.trim().is_empty() {
            anyhow::bail!("storage.path is required for the file backend");
        }

        if self.storage.max_bytes == 0 {
            anyhow::bail!("storage.max_bytes must be positive");
        }

        if self.flags.local_key_mode {
            tracing::warn!(
                "local_key_mode is on - private keys and addresses skip wallet backend initialization"
            );
        }

        Ok(())
    }

    /// Open the configured storage substrate
    ///
    /// An unreadable file store degrades to [`SafeStorage::unavailable`] so the
    /// engine still starts, in the "needs setup" state.
    pub fn open_storage(&self) -> SafeStorage {
        let backend: Arc<dyn KeyValueStore> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::with_quota(self.storage.max_bytes)),
            StorageBackend::File => match FileStore::open(&self.storage.path) {
                Ok(store) => Arc::new(store.with_max_bytes(self.storage.max_bytes)),
                Err(e) => {
                    tracing::warn!(
                        "Storage file {} unusable ({}), continuing without storage",
                        self.storage.path,
                        e
                    );
                    return SafeStorage::unavailable();
                }
            },
        };

        SafeStorage::new(backend)
    }

    /// Get configuration for display
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Storage:
    backend: {:?}
    path: {}
    max_bytes: {}
  Flags:
    local_key_mode: {}
    profile_extension_present: {}
    reset_clears_all_storage: {}
  Routes:
    home: {}
    setup: {}
    new_profile: {}
"#,
            self.storage.backend,
            self.storage.path,
            self.storage.max_bytes,
            self.flags.local_key_mode,
            self.flags.profile_extension_present,
            self.flags.reset_clears_all_storage,
            self.routes.home,
            self.routes.setup,
            self.routes.new_profile,
        )
    }
}
