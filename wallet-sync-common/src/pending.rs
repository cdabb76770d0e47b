//! Pending sent transactions and the status derived from them
//!
//! A send flow must not build a new spend while a previous one from the same
//! address may still be in flight. The status answers that question for one
//! address, combining the known wallet addresses with the per-address cache
//! of pending transactions.

use async_trait::async_trait;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::context::WalletContext;
use crate::logging::{log_sync, LogLevel};
use crate::network_status::SourceError;
use crate::types::{tracked_networks, Identity, Outpoint};

/// A transaction broadcast by this wallet and not yet confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Lower-case hex txid of the pending transaction
    pub txid: String,
    /// Outputs it spends
    pub utxos: Vec<Outpoint>,
}

/// Cached result of the last pending-transactions load for an address
///
/// An address missing from the cache has not been loaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCacheEntry {
    /// The last load failed
    Error,
    /// The last load succeeded; possibly with no transactions
    Loaded(Vec<PendingTransaction>),
}

/// Whether an address may have a conflicting spend in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingSentTransactionsStatus {
    Loading,
    Error,
    Some,
    None,
}

/// Addresses of the wallet, one per network, filled in as they are derived
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressStore {
    addresses: HashMap<Network, String>,
}

impl AddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, network: Network, address: impl Into<String>) {
        self.addresses.insert(network, address.into());
    }

    pub fn get(&self, network: Network) -> Option<&str> {
        self.addresses.get(&network).map(String::as_str)
    }

    pub fn is_loaded(&self, network: Network) -> bool {
        self.addresses.contains_key(&network)
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }
}

/// Pending transactions per address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTransactionsCache {
    entries: HashMap<String, PendingCacheEntry>,
}

impl PendingTransactionsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<&PendingCacheEntry> {
        self.entries.get(address)
    }

    pub fn set(&mut self, address: impl Into<String>, entry: PendingCacheEntry) {
        self.entries.insert(address.into(), entry);
    }

    pub fn remove(&mut self, address: &str) -> Option<PendingCacheEntry> {
        self.entries.remove(address)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Txids of every output spent by a pending transaction of `address`
    ///
    /// These are the outputs to hand to
    /// [`filter_locked_utxos`](crate::utxo_selection::filter_locked_utxos).
    pub fn locked_txids(&self, address: &str) -> HashSet<String> {
        match self.entries.get(address) {
            Some(PendingCacheEntry::Loaded(transactions)) => transactions
                .iter()
                .flat_map(|tx| tx.utxos.iter().map(Outpoint::txid_hex))
                .collect(),
            _ => HashSet::new(),
        }
    }
}

/// Derive the pending status of `address`
///
/// Rules, first match wins:
/// 1. any required address not loaded yet: `Loading`
/// 2. `address` is not one of the required addresses: `None`
/// 3. the cache entry decides: missing is `Loading`, a failed load is
///    `Error`, an empty list is `None`, anything else is `Some`
///
/// The required addresses are the mainnet one, plus testnet and regtest when
/// `testnets_enabled` is set.
pub fn pending_sent_transactions_status(
    address: &str,
    addresses: &AddressStore,
    testnets_enabled: bool,
    cache: &PendingTransactionsCache,
) -> PendingSentTransactionsStatus {
    let required = tracked_networks(testnets_enabled);

    let mut known = Vec::with_capacity(required.len());
    for network in required {
        match addresses.get(network) {
            Some(known_address) => known.push(known_address),
            None => return PendingSentTransactionsStatus::Loading,
        }
    }

    if !known.iter().any(|known_address| *known_address == address) {
        return PendingSentTransactionsStatus::None;
    }

    match cache.get(address) {
        None => PendingSentTransactionsStatus::Loading,
        Some(PendingCacheEntry::Error) => PendingSentTransactionsStatus::Error,
        Some(PendingCacheEntry::Loaded(transactions)) if transactions.is_empty() => {
            PendingSentTransactionsStatus::None
        }
        Some(PendingCacheEntry::Loaded(_)) => PendingSentTransactionsStatus::Some,
    }
}

/// Source of pending sent transactions
#[async_trait]
pub trait PendingTransactionsSource: Send + Sync {
    async fn get_pending_transactions(
        &self,
        identity: &Identity,
        address: &str,
        network: Network,
    ) -> Result<Vec<PendingTransaction>, SourceError>;
}

/// Refresh the cache entry of `address` from `source`
///
/// Failures are recorded as [`PendingCacheEntry::Error`] rather than
/// returned.
pub async fn load_pending_sent_transactions(
    context: &WalletContext,
    source: &dyn PendingTransactionsSource,
    identity: &Identity,
    address: &str,
    network: Network,
) {
    let entry = match source.get_pending_transactions(identity, address, network).await {
        Ok(transactions) => {
            log_sync(
                LogLevel::Debug,
                "Pending transactions loaded",
                Some(json!({ "address": address, "count": transactions.len() })),
            );
            PendingCacheEntry::Loaded(transactions)
        }
        Err(err) => {
            log_sync(
                LogLevel::Warn,
                "Failed to load pending transactions",
                Some(json!({ "address": address, "error": err.to_string() })),
            );
            PendingCacheEntry::Error
        }
    };
    context.set_pending_entry(address, entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TXID_LEN;

    fn pending(byte: u8) -> PendingTransaction {
        PendingTransaction {
            txid: hex::encode([byte; TXID_LEN]),
            utxos: vec![Outpoint::new([byte; TXID_LEN], 0), Outpoint::new([byte; TXID_LEN], 1)],
        }
    }

    #[test]
    fn test_cache_entry_mapping() {
        let mut addresses = AddressStore::new();
        addresses.set(Network::Bitcoin, "bc1q-main");
        let mut cache = PendingTransactionsCache::new();

        let status = |cache: &PendingTransactionsCache| {
            pending_sent_transactions_status("bc1q-main", &addresses, false, cache)
        };

        assert_eq!(status(&cache), PendingSentTransactionsStatus::Loading);
        cache.set("bc1q-main", PendingCacheEntry::Error);
        assert_eq!(status(&cache), PendingSentTransactionsStatus::Error);
        cache.set("bc1q-main", PendingCacheEntry::Loaded(vec![]));
        assert_eq!(status(&cache), PendingSentTransactionsStatus::None);
        cache.set("bc1q-main", PendingCacheEntry::Loaded(vec![pending(1)]));
        assert_eq!(status(&cache), PendingSentTransactionsStatus::Some);
    }

    #[test]
    fn test_locked_txids_deduplicated() {
        let mut cache = PendingTransactionsCache::new();
        cache.set("a", PendingCacheEntry::Loaded(vec![pending(1), pending(2)]));
        cache.set("b", PendingCacheEntry::Error);

        let locked = cache.locked_txids("a");
        assert_eq!(locked.len(), 2);
        assert!(locked.contains(&hex::encode([1u8; TXID_LEN])));
        assert!(cache.locked_txids("b").is_empty());
        assert!(cache.locked_txids("missing").is_empty());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(PendingSentTransactionsStatus::Loading).unwrap(),
            json!("LOADING")
        );
    }
}
