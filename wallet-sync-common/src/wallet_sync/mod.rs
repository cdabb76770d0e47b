//! Bitcoin wallet synchronization
//!
//! [`BtcWalletSyncJob`] keeps a wallet's balance and transactions fresh from
//! two sources on every tick:
//!
//! - the **uncertified** source, fast and unauthenticated, which also
//!   provides transactions
//! - the **certified** balance from the signer service
//!
//! Both are queried concurrently and each result is published as soon as it
//! arrives, so message order follows completion order. A failing source is
//! reported as `syncBtcWalletError` and never fails the job, which keeps the
//! owning schedule alive through transient outages.
//!
//! Messages published (through the scheduler, so only while it is active):
//!
//! | tag                  | data                                                     |
//! |----------------------|----------------------------------------------------------|
//! | `syncBtcWallet`      | `{ wallet: { balance: {certified, data}, newTransactions } }` |
//! | `syncBtcWalletError` | `{ error }`                                              |
//!
//! `newTransactions` is a JSON string holding the changed transactions.

pub mod sources;
pub mod transactions;

use async_trait::async_trait;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::WalletContext;
use crate::error::SyncResult;
use crate::events::MessageBus;
use crate::logging::{log_sync, LogLevel};
use crate::network_status::{BlockHeightProvider, SignerService};
use crate::pending::{load_pending_sent_transactions, PendingTransactionsSource};
use crate::scheduler::{IdentityProvider, Job, JobContext, SchedulerInterval, SchedulerTimer};
use crate::types::CertifiedData;

pub use sources::{UncertifiedWallet, UncertifiedWalletSource};
pub use transactions::{map_btc_transaction, BitcoinTransaction, BtcTransactionUi, TransactionKind, TransactionStatus};

/// Name of the scheduler running the job; its status tag is `syncBtcWalletStatus`
pub const SYNC_BTC_WALLET_SCHEDULER: &str = "syncBtcWallet";
pub const SYNC_BTC_WALLET_MSG: &str = "syncBtcWallet";
pub const SYNC_BTC_WALLET_ERROR_MSG: &str = "syncBtcWalletError";

/// Payload the job is scheduled with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcWalletSyncData {
    pub address: String,
    pub network: Network,
    pub should_fetch_transactions: bool,
}

/// Latest known wallet state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSyncSnapshot {
    pub balance: Option<CertifiedData<u64>>,
    pub transactions: HashMap<String, CertifiedData<BtcTransactionUi>>,
    pub latest_bitcoin_block_height: Option<u32>,
}

impl WalletSyncSnapshot {
    /// Record a balance, returning whether the stored value changed
    ///
    /// An uncertified balance never replaces a certified one of the same
    /// amount.
    fn apply_balance(&mut self, balance: CertifiedData<u64>) -> bool {
        if let Some(current) = &self.balance {
            let downgrade = current.certified && !balance.certified && current.data == balance.data;
            if downgrade || *current == balance {
                return false;
            }
        }
        self.balance = Some(balance);
        true
    }

    /// Merge transactions and return the entries that are new or changed
    fn merge_transactions(&mut self, transactions: Vec<BtcTransactionUi>, certified: bool) -> Vec<CertifiedData<BtcTransactionUi>> {
        let mut changed = Vec::new();
        for tx in transactions {
            let entry = CertifiedData { data: tx, certified };
            match self.transactions.get(&entry.data.id) {
                Some(current) if *current == entry => continue,
                Some(current) if current.certified && !certified && current.data == entry.data => continue,
                _ => {}
            }
            self.transactions.insert(entry.data.id.clone(), entry.clone());
            changed.push(entry);
        }
        changed
    }

    fn wallet_message(&self, new_transactions: &[CertifiedData<BtcTransactionUi>]) -> Result<serde_json::Value, serde_json::Error> {
        Ok(json!({
            "wallet": {
                "balance": self.balance,
                "newTransactions": serde_json::to_string(new_transactions)?,
            }
        }))
    }
}

/// Dual-source balance and transaction synchronization
pub struct BtcWalletSyncJob {
    uncertified: Arc<dyn UncertifiedWalletSource>,
    signer: Arc<dyn SignerService>,
    block_height: Arc<dyn BlockHeightProvider>,
    pending: Option<(Arc<WalletContext>, Arc<dyn PendingTransactionsSource>)>,
    snapshot: Mutex<WalletSyncSnapshot>,
    /// Bumped by `reset`; runs started before it must not write back
    epoch: AtomicU64,
}

impl BtcWalletSyncJob {
    pub fn new(
        uncertified: Arc<dyn UncertifiedWalletSource>,
        signer: Arc<dyn SignerService>,
        block_height: Arc<dyn BlockHeightProvider>,
    ) -> Self {
        Self {
            uncertified,
            signer,
            block_height,
            pending: None,
            snapshot: Mutex::new(WalletSyncSnapshot::default()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Also refresh the pending sent transactions of the address on every tick
    pub fn with_pending_transactions(mut self, context: Arc<WalletContext>, source: Arc<dyn PendingTransactionsSource>) -> Self {
        self.pending = Some((context, source));
        self
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, WalletSyncSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot guard for a run started in `epoch`, `None` once reset since
    fn lock_for_run(&self, epoch: u64) -> Option<MutexGuard<'_, WalletSyncSnapshot>> {
        let snapshot = self.lock_snapshot();
        (self.epoch.load(Ordering::SeqCst) == epoch).then_some(snapshot)
    }

    pub fn snapshot(&self) -> WalletSyncSnapshot {
        self.lock_snapshot().clone()
    }

    /// Forget the synchronized state
    ///
    /// A run still in flight finishes without writing its results.
    pub fn reset(&self) {
        let mut snapshot = self.lock_snapshot();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *snapshot = WalletSyncSnapshot::default();
    }

    async fn refresh_block_height(&self, epoch: u64) {
        match self.block_height.btc_latest_block_height().await {
            Ok(height) => {
                if let Some(mut snapshot) = self.lock_for_run(epoch) {
                    snapshot.latest_bitcoin_block_height = Some(height);
                }
            }
            Err(err) => log_sync(
                LogLevel::Warn,
                "Latest block height unavailable, keeping previous value",
                Some(json!({ "error": err.to_string() })),
            ),
        }
    }

    async fn sync_uncertified(&self, ctx: &JobContext<BtcWalletSyncData>, epoch: u64) {
        let data = &ctx.data;
        let with_transactions = data.should_fetch_transactions;

        let load = self
            .uncertified
            .load_balance_and_transactions(&data.address, data.network, with_transactions);
        let result = if with_transactions {
            let (_, result) = tokio::join!(self.refresh_block_height(epoch), load);
            result
        } else {
            load.await
        };

        let wallet = match result {
            Ok(wallet) => wallet,
            Err(err) => return post_error(ctx, "uncertified", &err.to_string()),
        };

        let message = {
            let Some(mut snapshot) = self.lock_for_run(epoch) else {
                return;
            };
            let balance_changed = snapshot.apply_balance(CertifiedData::uncertified(wallet.balance));
            let latest = snapshot.latest_bitcoin_block_height;
            let mapped = wallet
                .transactions
                .iter()
                .map(|tx| map_btc_transaction(tx, &data.address, latest))
                .collect();
            let new_transactions = snapshot.merge_transactions(mapped, false);

            if balance_changed || !new_transactions.is_empty() {
                Some(snapshot.wallet_message(&new_transactions))
            } else {
                None
            }
        };
        post_wallet(ctx, message);
    }

    async fn sync_certified(&self, ctx: &JobContext<BtcWalletSyncData>, epoch: u64) {
        let balance = match self.signer.get_btc_balance(&ctx.identity, ctx.data.network).await {
            Ok(balance) => balance,
            Err(err) => return post_error(ctx, "certified", &err.to_string()),
        };

        let message = {
            let Some(mut snapshot) = self.lock_for_run(epoch) else {
                return;
            };
            if snapshot.apply_balance(CertifiedData::certified(balance)) {
                Some(snapshot.wallet_message(&[]))
            } else {
                None
            }
        };
        post_wallet(ctx, message);
    }

    async fn sync_pending(&self, ctx: &JobContext<BtcWalletSyncData>) {
        if let Some((context, source)) = &self.pending {
            load_pending_sent_transactions(context, source.as_ref(), &ctx.identity, &ctx.data.address, ctx.data.network)
                .await;
        }
    }
}

fn post_wallet(ctx: &JobContext<BtcWalletSyncData>, message: Option<Result<serde_json::Value, serde_json::Error>>) {
    match message {
        Some(Ok(data)) => {
            ctx.post_msg(SYNC_BTC_WALLET_MSG, data);
        }
        Some(Err(err)) => post_error(ctx, "serialization", &err.to_string()),
        None => {}
    }
}

fn post_error(ctx: &JobContext<BtcWalletSyncData>, source: &str, error: &str) {
    log_sync(
        LogLevel::Warn,
        "Wallet sync source failed",
        Some(json!({ "source": source, "address": ctx.data.address, "error": error })),
    );
    ctx.post_msg(SYNC_BTC_WALLET_ERROR_MSG, json!({ "error": error }));
}

#[async_trait]
impl Job<BtcWalletSyncData> for BtcWalletSyncJob {
    async fn run(&self, ctx: JobContext<BtcWalletSyncData>) -> anyhow::Result<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        tokio::join!(
            self.sync_uncertified(&ctx, epoch),
            self.sync_certified(&ctx, epoch),
            self.sync_pending(&ctx),
        );
        Ok(())
    }
}

/// A [`BtcWalletSyncJob`] paired with the scheduler that runs it
pub struct BtcWalletSyncWorker {
    scheduler: SchedulerTimer,
    job: Arc<BtcWalletSyncJob>,
}

impl BtcWalletSyncWorker {
    pub fn new(bus: MessageBus, identity: Arc<dyn IdentityProvider>, job: BtcWalletSyncJob) -> Self {
        Self {
            scheduler: SchedulerTimer::new(SYNC_BTC_WALLET_SCHEDULER, bus, identity),
            job: Arc::new(job),
        }
    }

    pub fn scheduler(&self) -> &SchedulerTimer {
        &self.scheduler
    }

    pub fn snapshot(&self) -> WalletSyncSnapshot {
        self.job.snapshot()
    }

    pub async fn start(&self, interval: SchedulerInterval, data: BtcWalletSyncData) -> SyncResult<()> {
        let job: Arc<dyn Job<BtcWalletSyncData>> = self.job.clone();
        self.scheduler.start(interval, job, data).await
    }

    pub async fn trigger(&self, data: BtcWalletSyncData) -> SyncResult<()> {
        let job: Arc<dyn Job<BtcWalletSyncData>> = self.job.clone();
        self.scheduler.trigger(job, data).await
    }

    /// Stop the schedule and forget the synchronized state
    ///
    /// A run in flight is left to finish but its results are discarded.
    pub fn stop(&self) {
        self.scheduler.stop();
        self.job.reset();
    }
}
