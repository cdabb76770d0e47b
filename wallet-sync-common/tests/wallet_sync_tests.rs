//! Dual-source wallet synchronization under a running scheduler


use async_trait::async_trait;
use bitcoin::Network;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{drain, identity, init_test_environment, states, FakePending, FakeSigner, FakeUncertified};
use tokio::time::sleep;

use wallet_sync_common::context::WalletContext;
use wallet_sync_common::events::{MessageBus, WorkerMessage};
use wallet_sync_common::network_status::{SourceError, StaticBlockHeight};
use wallet_sync_common::pending::{PendingSentTransactionsStatus, PendingTransaction};
use wallet_sync_common::scheduler::{SchedulerInterval, StaticIdentity};
use wallet_sync_common::types::CertifiedData;
use wallet_sync_common::wallet_sync::transactions::TxEndpoint;
use wallet_sync_common::wallet_sync::{
    BitcoinTransaction, BtcTransactionUi, BtcWalletSyncData, BtcWalletSyncJob, BtcWalletSyncWorker,
    TransactionStatus, UncertifiedWallet, UncertifiedWalletSource, SYNC_BTC_WALLET_ERROR_MSG,
    SYNC_BTC_WALLET_MSG,
};

const ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
const INTERVAL: Duration = Duration::from_secs(60);

fn data(should_fetch_transactions: bool) -> BtcWalletSyncData {
    BtcWalletSyncData {
        address: ADDRESS.to_string(),
        network: Network::Bitcoin,
        should_fetch_transactions,
    }
}

fn incoming(hash: &str, block_height: Option<u32>) -> BitcoinTransaction {
    BitcoinTransaction {
        hash: hash.to_string(),
        block_height,
        timestamp: Some(1_700_000_000),
        inputs: vec![TxEndpoint {
            address: Some("bc1q-sender".to_string()),
            value: 60_000,
        }],
        outputs: vec![TxEndpoint {
            address: Some(ADDRESS.to_string()),
            value: 50_000,
        }],
    }
}

fn worker(bus: &MessageBus, uncertified: Arc<FakeUncertified>, signer: Arc<FakeSigner>) -> BtcWalletSyncWorker {
    let job = BtcWalletSyncJob::new(uncertified, signer, Arc::new(StaticBlockHeight(840_010)));
    BtcWalletSyncWorker::new(bus.clone(), Arc::new(StaticIdentity::new(Some(identity()))), job)
}

fn balance(message: &WorkerMessage) -> CertifiedData<u64> {
    serde_json::from_value(message.data["wallet"]["balance"].clone()).unwrap()
}

fn new_transactions(message: &WorkerMessage) -> Vec<CertifiedData<BtcTransactionUi>> {
    let raw = message.data["wallet"]["newTransactions"].as_str().unwrap();
    serde_json::from_str(raw).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_both_sources_report_independently() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut wallet = bus.subscribe(SYNC_BTC_WALLET_MSG);
    let uncertified = Arc::new(FakeUncertified::always(Ok(UncertifiedWallet {
        balance: 50_000,
        transactions: vec![incoming("aa", Some(840_000))],
    })));
    let signer = Arc::new(FakeSigner::always(Ok(49_000)));
    let worker = worker(&bus, uncertified, signer);

    worker.trigger(data(true)).await.unwrap();

    let messages = drain(&mut wallet);
    assert_eq!(messages.len(), 2);

    let fast = messages.iter().find(|m| !balance(m).certified).unwrap();
    assert_eq!(balance(fast).data, 50_000);
    let txs = new_transactions(fast);
    assert_eq!(txs.len(), 1);
    assert!(!txs[0].certified);
    assert_eq!(txs[0].data.confirmations, 11);
    assert_eq!(txs[0].data.status, TransactionStatus::Confirmed);

    let certified = messages.iter().find(|m| balance(m).certified).unwrap();
    assert_eq!(balance(certified).data, 49_000);
    assert!(new_transactions(certified).is_empty());

    let snapshot = worker.snapshot();
    assert_eq!(snapshot.latest_bitcoin_block_height, Some(840_010));
    assert!(snapshot.transactions.contains_key("aa"));
}

#[tokio::test(start_paused = true)]
async fn test_source_failure_is_reported_and_schedule_continues() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut wallet = bus.subscribe(SYNC_BTC_WALLET_MSG);
    let mut errors = bus.subscribe(SYNC_BTC_WALLET_ERROR_MSG);
    let mut status = bus.subscribe("syncBtcWalletStatus");

    let uncertified = Arc::new(FakeUncertified::always(Ok(UncertifiedWallet {
        balance: 10_000,
        transactions: Vec::new(),
    })));
    let signer = Arc::new(FakeSigner::always(Err(SourceError::Unavailable("signer offline".to_string()))));
    let worker = worker(&bus, uncertified.clone(), signer.clone());

    worker.start(SchedulerInterval::Every(INTERVAL), data(false)).await.unwrap();
    assert!(worker.scheduler().is_running());
    assert_eq!(states(&mut status), vec!["in_progress", "idle"]);

    let reported = drain(&mut errors);
    assert_eq!(reported.len(), 1);
    assert!(reported[0].data["error"].as_str().unwrap().contains("signer offline"));
    assert_eq!(drain(&mut wallet).len(), 1);

    sleep(INTERVAL * 2 + Duration::from_millis(1)).await;
    assert_eq!(signer.calls(), 3);
    assert_eq!(uncertified.calls(), 3);
    assert!(worker.scheduler().is_running());
    assert_eq!(drain(&mut errors).len(), 2);
    // balance unchanged after the first tick
    assert!(drain(&mut wallet).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_both_sources_failing_keeps_schedule() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut errors = bus.subscribe(SYNC_BTC_WALLET_ERROR_MSG);
    let uncertified = Arc::new(FakeUncertified::always(Err(SourceError::InvalidResponse("bad json".to_string()))));
    let signer = Arc::new(FakeSigner::always(Err(SourceError::Rejected("expired".to_string()))));
    let worker = worker(&bus, uncertified, signer);

    worker.start(SchedulerInterval::Every(INTERVAL), data(true)).await.unwrap();
    assert_eq!(drain(&mut errors).len(), 2);
    assert!(worker.scheduler().is_running());
    assert_eq!(worker.snapshot().balance, None);
}

#[tokio::test(start_paused = true)]
async fn test_certified_balance_not_downgraded() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut wallet = bus.subscribe(SYNC_BTC_WALLET_MSG);
    let uncertified = Arc::new(FakeUncertified::new(vec![
        Err(SourceError::Unavailable("slow".to_string())),
        Ok(UncertifiedWallet {
            balance: 70_000,
            transactions: Vec::new(),
        }),
    ]));
    let signer = Arc::new(FakeSigner::always(Ok(70_000)));
    let worker = worker(&bus, uncertified, signer);

    worker.trigger(data(false)).await.unwrap();
    assert_eq!(worker.snapshot().balance, Some(CertifiedData::certified(70_000)));
    drain(&mut wallet);

    worker.trigger(data(false)).await.unwrap();
    assert_eq!(worker.snapshot().balance, Some(CertifiedData::certified(70_000)));
    assert!(drain(&mut wallet).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transaction_updates_are_broadcast_as_new() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut wallet = bus.subscribe(SYNC_BTC_WALLET_MSG);
    let uncertified = Arc::new(FakeUncertified::new(vec![
        Ok(UncertifiedWallet {
            balance: 50_000,
            transactions: vec![incoming("aa", None)],
        }),
        Ok(UncertifiedWallet {
            balance: 50_000,
            transactions: vec![incoming("aa", Some(840_008)), incoming("bb", None)],
        }),
    ]));
    let signer = Arc::new(FakeSigner::always(Err(SourceError::Unavailable("down".to_string()))));
    let worker = worker(&bus, uncertified, signer);

    worker.trigger(data(true)).await.unwrap();
    let first = drain(&mut wallet);
    assert_eq!(first.len(), 1);
    assert_eq!(new_transactions(&first[0])[0].data.status, TransactionStatus::Pending);

    worker.trigger(data(true)).await.unwrap();
    let second = drain(&mut wallet);
    assert_eq!(second.len(), 1);
    let txs = new_transactions(&second[0]);
    assert_eq!(txs.len(), 2);
    let aa = txs.iter().find(|tx| tx.data.id == "aa").unwrap();
    assert_eq!(aa.data.status, TransactionStatus::Unconfirmed);
    assert_eq!(aa.data.confirmations, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_resets_snapshot_and_suppresses_messages() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut all = bus.subscribe_all();
    let uncertified = Arc::new(FakeUncertified::always(Ok(UncertifiedWallet {
        balance: 1,
        transactions: Vec::new(),
    })));
    let signer = Arc::new(FakeSigner::always(Ok(1)));
    let worker = worker(&bus, uncertified.clone(), signer);

    worker.start(SchedulerInterval::Every(INTERVAL), data(false)).await.unwrap();
    assert!(worker.snapshot().balance.is_some());

    worker.stop();
    assert_eq!(worker.snapshot().balance, None);
    assert!(!worker.scheduler().is_running());
    drain(&mut all);

    sleep(INTERVAL * 3).await;
    assert_eq!(uncertified.calls(), 1);
    assert!(drain(&mut all).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pending_transactions_loaded_into_context() {
    init_test_environment();
    let bus = MessageBus::new();
    let context = Arc::new(WalletContext::new(false));
    context.init_on_unlock();
    context.set_address(Network::Bitcoin, ADDRESS);

    let pending = Arc::new(FakePending::new(vec![
        Ok(vec![PendingTransaction {
            txid: "cc".repeat(32),
            utxos: Vec::new(),
        }]),
        Err(SourceError::Unavailable("index down".to_string())),
    ]));
    let job = BtcWalletSyncJob::new(
        Arc::new(FakeUncertified::always(Ok(UncertifiedWallet::default()))),
        Arc::new(FakeSigner::always(Ok(0))),
        Arc::new(StaticBlockHeight(1)),
    )
    .with_pending_transactions(context.clone(), pending);
    let worker = BtcWalletSyncWorker::new(bus, Arc::new(StaticIdentity::new(Some(identity()))), job);

    assert_eq!(context.pending_status(ADDRESS), PendingSentTransactionsStatus::Loading);

    worker.trigger(data(false)).await.unwrap();
    assert_eq!(context.pending_status(ADDRESS), PendingSentTransactionsStatus::Some);

    worker.trigger(data(false)).await.unwrap();
    assert_eq!(context.pending_status(ADDRESS), PendingSentTransactionsStatus::Error);
}

/// Uncertified source answering after a delay
struct SlowUncertified {
    delay: Duration,
    wallet: UncertifiedWallet,
}

#[async_trait]
impl UncertifiedWalletSource for SlowUncertified {
    async fn load_balance_and_transactions(
        &self,
        _address: &str,
        _network: Network,
        _with_transactions: bool,
    ) -> Result<UncertifiedWallet, SourceError> {
        sleep(self.delay).await;
        Ok(self.wallet.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_results_of_run_in_flight() {
    init_test_environment();
    let bus = MessageBus::new();
    let mut wallet = bus.subscribe(SYNC_BTC_WALLET_MSG);
    let uncertified = Arc::new(SlowUncertified {
        delay: Duration::from_secs(5),
        wallet: UncertifiedWallet {
            balance: 80_000,
            transactions: vec![incoming("aa", Some(840_000))],
        },
    });
    let job = BtcWalletSyncJob::new(
        uncertified,
        Arc::new(FakeSigner::always(Ok(75_000))),
        Arc::new(StaticBlockHeight(840_010)),
    );
    let worker = BtcWalletSyncWorker::new(bus.clone(), Arc::new(StaticIdentity::new(Some(identity()))), job);

    let (triggered, _) = tokio::join!(worker.trigger(data(true)), async {
        sleep(Duration::from_secs(1)).await;
        worker.stop();
    });
    assert!(triggered.is_ok());

    // only the certified balance landed before the stop
    assert_eq!(drain(&mut wallet).len(), 1);
    assert_eq!(worker.snapshot(), Default::default());

    // the next run writes again
    worker.trigger(data(true)).await.unwrap();
    let snapshot = worker.snapshot();
    assert_eq!(snapshot.latest_bitcoin_block_height, Some(840_010));
    assert!(snapshot.transactions.contains_key("aa"));
}
