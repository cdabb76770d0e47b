//! Uncertified wallet data source

use async_trait::async_trait;
use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::network_status::SourceError;
use crate::wallet_sync::transactions::BitcoinTransaction;

/// Balance and transactions read from the fast, unauthenticated source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncertifiedWallet {
    pub balance: u64,
    /// Empty unless transactions were requested
    pub transactions: Vec<BitcoinTransaction>,
}

#[async_trait]
pub trait UncertifiedWalletSource: Send + Sync {
    async fn load_balance_and_transactions(
        &self,
        address: &str,
        network: Network,
        with_transactions: bool,
    ) -> Result<UncertifiedWallet, SourceError>;
}
