//! Wallet-scoped state owned by the synchronization layer
//!
//! [`WalletContext`] replaces process-wide stores: it is created by the host,
//! shared by reference with the jobs that write to it, and reset when the
//! wallet is unlocked or the user signs out. Readers only ever receive
//! cloned snapshots.

use bitcoin::Network;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::logging::{log_sync, LogLevel};
use crate::pending::{
    pending_sent_transactions_status, AddressStore, PendingCacheEntry, PendingSentTransactionsStatus,
    PendingTransactionsCache,
};

#[derive(Debug, Default)]
pub struct WalletContext {
    addresses: RwLock<AddressStore>,
    pending: RwLock<PendingTransactionsCache>,
    testnets_enabled: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WalletContext {
    pub fn new(testnets_enabled: bool) -> Self {
        Self {
            addresses: RwLock::new(AddressStore::new()),
            pending: RwLock::new(PendingTransactionsCache::new()),
            testnets_enabled: AtomicBool::new(testnets_enabled),
        }
    }

    /// Start from empty stores for a freshly unlocked wallet
    pub fn init_on_unlock(&self) {
        self.reset();
        log_sync(LogLevel::Info, "Wallet context initialized", None);
    }

    /// Forget every address and pending transaction
    pub fn teardown_on_sign_out(&self) {
        self.reset();
        log_sync(LogLevel::Info, "Wallet context cleared", None);
    }

    fn reset(&self) {
        write(&self.addresses).clear();
        write(&self.pending).clear();
    }

    pub fn testnets_enabled(&self) -> bool {
        self.testnets_enabled.load(Ordering::SeqCst)
    }

    pub fn set_testnets_enabled(&self, enabled: bool) {
        self.testnets_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_address(&self, network: Network, address: impl Into<String>) {
        let address = address.into();
        log_sync(
            LogLevel::Debug,
            "Address loaded",
            Some(json!({ "network": network.to_string(), "address": address })),
        );
        write(&self.addresses).set(network, address);
    }

    pub fn set_pending_entry(&self, address: &str, entry: PendingCacheEntry) {
        write(&self.pending).set(address, entry);
    }

    pub fn addresses(&self) -> AddressStore {
        read(&self.addresses).clone()
    }

    pub fn pending_cache(&self) -> PendingTransactionsCache {
        read(&self.pending).clone()
    }

    pub fn locked_txids(&self, address: &str) -> HashSet<String> {
        read(&self.pending).locked_txids(address)
    }

    /// Pending status of `address` against the current stores
    pub fn pending_status(&self, address: &str) -> PendingSentTransactionsStatus {
        let addresses = read(&self.addresses);
        let pending = read(&self.pending);
        pending_sent_transactions_status(address, &addresses, self.testnets_enabled(), &pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_resets_stores() {
        let context = WalletContext::new(false);
        context.set_address(Network::Bitcoin, "bc1q-main");
        context.set_pending_entry("bc1q-main", PendingCacheEntry::Loaded(vec![]));
        assert_eq!(context.pending_status("bc1q-main"), PendingSentTransactionsStatus::None);

        context.teardown_on_sign_out();
        assert_eq!(context.addresses(), AddressStore::new());
        assert_eq!(context.pending_cache(), PendingTransactionsCache::new());
        assert_eq!(context.pending_status("bc1q-main"), PendingSentTransactionsStatus::Loading);
    }

    #[test]
    fn test_enabling_testnets_requires_more_addresses() {
        let context = WalletContext::new(false);
        context.init_on_unlock();
        context.set_address(Network::Bitcoin, "bc1q-main");
        context.set_pending_entry("bc1q-main", PendingCacheEntry::Loaded(vec![]));
        assert_eq!(context.pending_status("bc1q-main"), PendingSentTransactionsStatus::None);

        context.set_testnets_enabled(true);
        assert_eq!(context.pending_status("bc1q-main"), PendingSentTransactionsStatus::Loading);
    }
}
