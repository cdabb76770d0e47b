//! External Bitcoin data collaborators
//!
//! The synchronization layer never talks to the network itself. It reads
//! the chain tip and the signer-certified balance through the traits
//! defined here, which the host application implements over its own
//! transport.

use async_trait::async_trait;
use bitcoin::Network;
use thiserror::Error;

use crate::types::Identity;

/// Failures reported by an external data source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The service could not be reached or timed out
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with data that could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service refused the request (for example an expired identity)
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Source of the latest Bitcoin block height
#[async_trait]
pub trait BlockHeightProvider: Send + Sync {
    async fn btc_latest_block_height(&self) -> Result<u32, SourceError>;
}

/// Signer service exposing the certified balance of the caller's address
#[async_trait]
pub trait SignerService: Send + Sync {
    /// Balance in satoshis of the identity's address on `network`
    async fn get_btc_balance(&self, identity: &Identity, network: Network) -> Result<u64, SourceError>;
}

/// Fixed block height, for tests and offline tooling
#[derive(Debug, Clone, Copy)]
pub struct StaticBlockHeight(pub u32);

#[async_trait]
impl BlockHeightProvider for StaticBlockHeight {
    async fn btc_latest_block_height(&self) -> Result<u32, SourceError> {
        Ok(self.0)
    }
}
