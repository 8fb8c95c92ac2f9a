//! Offline wallet backend for the command line
//!
//! There is no wallet node behind the CLI. Imports are accepted as-is and new
//! wallets cannot be created.

use async_trait::async_trait;
use tracing::debug;

use crate::bootstrap::WalletInitializer;
use crate::credential::CredentialRecord;
use crate::error::InitError;

#[derive(Debug, Default)]
pub struct OfflineInitializer;

#[async_trait]
impl WalletInitializer for OfflineInitializer {
    async fn initialize(&self, record: &CredentialRecord) -> Result<(), InitError> {
        debug!("Offline backend accepting {} wallet", record.kind);
        Ok(())
    }

    async fn create_wallet(&self) -> Result<CredentialRecord, InitError> {
        Err(InitError::Unavailable(
            "wallet creation needs a wallet backend; import a mnemonic, key or address instead"
                .to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
