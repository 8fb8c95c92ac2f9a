//! Wallet backend seam

use async_trait::async_trait;

use crate::credential::CredentialRecord;
use crate::error::InitError;

/// The wallet backend that turns a credential into a usable wallet
///
/// Both calls may be invoked any number of times; the bootstrapper may abandon a
/// call at any point, so implementations must not depend on running to completion.
#[async_trait]
pub trait WalletInitializer: Send + Sync {
    /// Initialize the wallet from a stored or freshly imported record
    async fn initialize(&self, record: &CredentialRecord) -> Result<(), InitError>;

    /// Create a brand new wallet and return the record describing it
    async fn create_wallet(&self) -> Result<CredentialRecord, InitError>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "wallet-backend"
    }
}
