//! Setup input classification
//!
//! Maps raw user text to a [`CredentialKind`]. Pure and deterministic; the
//! order of the checks matters because the shape tests overlap.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::types::{CredentialKind, CredentialRecord};

/// Word count of a supported mnemonic
pub const MNEMONIC_WORDS: usize = 12;

/// Accepted WIF key lengths (uncompressed, compressed)
const WIF_LENGTHS: [usize; 2] = [51, 52];

/// First characters a mainnet WIF key may start with
const WIF_PREFIXES: [char; 3] = ['5', 'K', 'L'];

/// Address prefixes (P2PKH, P2SH, bech32 mainnet, bech32 testnet)
const ADDRESS_PREFIXES: [&str; 4] = ["1", "3", "bc1", "tb1"];

static HEX_KEY: OnceLock<Regex> = OnceLock::new();

fn hex_key() -> &'static Regex {
    HEX_KEY.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("Invalid hex key regex"))
}

/// What setup should do with an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupPlan {
    /// Persist the record and initialize the wallet from it
    Import(CredentialRecord),

    /// Ask the backend for a brand new wallet
    CreateFresh,
}

/// Classify raw setup text
///
/// First match wins:
/// 1. empty after trimming → `Unrecognized`
/// 2. exactly 12 whitespace-separated tokens → `Mnemonic`
/// 3. 51/52 chars starting with `5`, `K` or `L` → `WifKey`
/// 4. 64 hex digits → `HexKey`
/// 5. starts with `1`, `3`, `bc1` or `tb1` → `Address`
/// 6. otherwise `Unrecognized`
pub fn classify(raw: &str) -> CredentialKind {
    let input = raw.trim();

    if input.is_empty() {
        return CredentialKind::Unrecognized;
    }

    if input.split_whitespace().count() == MNEMONIC_WORDS {
        return CredentialKind::Mnemonic;
    }

    let len = input.chars().count();

    if WIF_LENGTHS.contains(&len) && input.starts_with(WIF_PREFIXES) {
        return CredentialKind::WifKey;
    }

    if hex_key().is_match(input) {
        return CredentialKind::HexKey;
    }

    if ADDRESS_PREFIXES.iter().any(|p| input.starts_with(p)) {
        return CredentialKind::Address;
    }

    CredentialKind::Unrecognized
}

/// Classify raw setup text and decide the setup plan
///
/// Importable inputs become a completed record holding the trimmed text.
pub fn classify_input(raw: &str) -> SetupPlan {
    let kind = classify(raw);
    debug!("Classified setup input as {}", kind);

    if kind.is_persistable() {
        SetupPlan::Import(CredentialRecord::new(kind, raw.trim()))
    } else {
        SetupPlan::CreateFresh
    }
}
