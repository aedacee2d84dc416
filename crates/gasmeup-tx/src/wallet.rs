//! Wallet signing capability.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("user declined the signature request")]
    Declined,
    #[error("wallet error: {0}")]
    Failed(String),
}

/// Signs transaction bytes and returns the signature. Implementations must not
/// broadcast: the sponsor relay submits the transaction.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<Vec<u8>, WalletError>;
}
