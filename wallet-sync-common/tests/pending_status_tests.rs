//! Pending status derivation and its effect on spend preparation


use bitcoin::Network;
use test_utils::{init_test_environment, utxo};

use wallet_sync_common::context::WalletContext;
use wallet_sync_common::pending::{PendingCacheEntry, PendingSentTransactionsStatus, PendingTransaction};
use wallet_sync_common::utxo_management::{prepare_btc_send, PrepareBtcSendParams, UtxosFeeError};
use wallet_sync_common::utxo_selection::UtxoFilterOptions;

const MAINNET: &str = "bc1q-main";
const TESTNET: &str = "tb1q-test";
const REGTEST: &str = "bcrt1q-reg";

fn unlocked(testnets_enabled: bool) -> WalletContext {
    let context = WalletContext::new(testnets_enabled);
    context.init_on_unlock();
    context
}

#[test]
fn test_missing_testnet_addresses_keep_every_address_loading() {
    init_test_environment();
    let context = unlocked(true);
    context.set_address(Network::Bitcoin, MAINNET);
    context.set_pending_entry(MAINNET, PendingCacheEntry::Loaded(vec![]));

    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::Loading);
    assert_eq!(context.pending_status("bc1q-elsewhere"), PendingSentTransactionsStatus::Loading);

    context.set_address(Network::Testnet, TESTNET);
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::Loading);

    context.set_address(Network::Regtest, REGTEST);
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::None);
    assert_eq!(context.pending_status(TESTNET), PendingSentTransactionsStatus::Loading);
}

#[test]
fn test_unrelated_address_has_no_pending_transactions() {
    init_test_environment();
    let context = unlocked(false);
    context.set_address(Network::Bitcoin, MAINNET);

    assert_eq!(context.pending_status("bc1q-elsewhere"), PendingSentTransactionsStatus::None);
}

#[test]
fn test_cache_entry_decides_for_known_address() {
    init_test_environment();
    let context = unlocked(false);
    context.set_address(Network::Bitcoin, MAINNET);
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::Loading);

    context.set_pending_entry(MAINNET, PendingCacheEntry::Error);
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::Error);

    context.set_pending_entry(MAINNET, PendingCacheEntry::Loaded(vec![]));
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::None);

    context.set_pending_entry(
        MAINNET,
        PendingCacheEntry::Loaded(vec![PendingTransaction {
            txid: "ab".repeat(32),
            utxos: Vec::new(),
        }]),
    );
    assert_eq!(context.pending_status(MAINNET), PendingSentTransactionsStatus::Some);
}

#[test]
fn test_send_flow_respects_pending_state() {
    init_test_environment();
    let context = unlocked(false);
    context.set_address(Network::Bitcoin, MAINNET);
    let utxos = vec![utxo(1, 200_000, 20), utxo(2, 100_000, 20)];
    let options = UtxoFilterOptions::default();

    let prepare = |context: &WalletContext| {
        let pending_txids = context.locked_txids(MAINNET);
        prepare_btc_send(PrepareBtcSendParams {
            utxos: &utxos,
            amount_satoshis: 150_000,
            fee_rate_satoshis_per_byte: 10,
            pending_status: context.pending_status(MAINNET),
            pending_txids: &pending_txids,
            options: &options,
        })
    };

    // not loaded yet
    assert_eq!(prepare(&context).error, Some(UtxosFeeError::PendingTransactions));

    context.set_pending_entry(MAINNET, PendingCacheEntry::Loaded(vec![]));
    let fee = prepare(&context);
    assert_eq!(fee.error, None);
    assert_eq!(fee.utxos, vec![utxos[0].clone()]);
    assert_eq!(fee.fee_satoshis, 1_400);

    context.set_pending_entry(
        MAINNET,
        PendingCacheEntry::Loaded(vec![PendingTransaction {
            txid: "cd".repeat(32),
            utxos: vec![utxos[0].outpoint],
        }]),
    );
    assert_eq!(prepare(&context).error, Some(UtxosFeeError::PendingTransactions));
    assert!(context.locked_txids(MAINNET).contains(&utxos[0].outpoint.txid_hex()));

    context.teardown_on_sign_out();
    assert_eq!(prepare(&context).error, Some(UtxosFeeError::PendingTransactions));
}
