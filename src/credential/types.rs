//! Core credential types
//!
//! Defines the claimed kind of a setup input and the persisted record.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of secret material a setup input claims to be
///
/// This is a *claimed* kind: the classifier only looks at shape, never at
/// checksums or wordlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// 12 whitespace-separated words
    Mnemonic,

    /// Wallet Import Format private key
    #[serde(rename = "wif")]
    WifKey,

    /// 64 hex digit private key
    #[serde(rename = "hex")]
    HexKey,

    /// Bitcoin address (watch-only)
    Address,

    /// Anything else; setup falls back to creating a fresh wallet
    Unrecognized,
}

impl CredentialKind {
    /// Tag stored under the kind key
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Mnemonic => "mnemonic",
            CredentialKind::WifKey => "wif",
            CredentialKind::HexKey => "hex",
            CredentialKind::Address => "address",
            CredentialKind::Unrecognized => "unrecognized",
        }
    }

    /// Human-readable name for wallet info screens
    pub fn label(&self) -> &'static str {
        match self {
            CredentialKind::Mnemonic => "Mnemonic",
            CredentialKind::WifKey => "WIF Private Key",
            CredentialKind::HexKey => "Hex Private Key",
            CredentialKind::Address => "Bitcoin Address",
            CredentialKind::Unrecognized => "Unknown",
        }
    }

    /// Check if this kind carries a single private key
    pub fn is_private_key(&self) -> bool {
        matches!(self, CredentialKind::WifKey | CredentialKind::HexKey)
    }

    /// Check if this kind can only watch, never sign
    pub fn is_watch_only(&self) -> bool {
        matches!(self, CredentialKind::Address)
    }

    /// Check if a record of this kind may be persisted
    pub fn is_persistable(&self) -> bool {
        !matches!(self, CredentialKind::Unrecognized)
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mnemonic" => Ok(CredentialKind::Mnemonic),
            "wif" => Ok(CredentialKind::WifKey),
            "hex" => Ok(CredentialKind::HexKey),
            "address" => Ok(CredentialKind::Address),
            other => Err(format!("unknown credential kind: {}", other)),
        }
    }
}

/// The single persisted unit describing the wallet's credential
///
/// Always replaced wholesale. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Claimed kind
    pub kind: CredentialKind,

    /// Raw classified value (full phrase for mnemonics)
    pub secret_or_address: String,

    /// Whether setup finished for this record
    pub setup_completed: bool,
}

/// Characters of a secret shown in previews
const PREVIEW_CHARS: usize = 20;

impl CredentialRecord {
    /// Create a completed record
    pub fn new(kind: CredentialKind, secret_or_address: impl Into<String>) -> Self {
        Self {
            kind,
            secret_or_address: secret_or_address.into(),
            setup_completed: true,
        }
    }

    /// Display-safe rendering of the value
    ///
    /// Addresses are public and shown in full. Secrets are cut to their first
    /// characters.
    pub fn preview(&self) -> String {
        if self.kind.is_watch_only() {
            return self.secret_or_address.clone();
        }

        let head: String = self.secret_or_address.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.kind.is_watch_only() {
            self.secret_or_address.as_str()
        } else {
            "***"
        };

        f.debug_struct("CredentialRecord")
            .field("kind", &self.kind)
            .field("secret_or_address", &value)
            .field("setup_completed", &self.setup_completed)
            .finish()
    }
}
