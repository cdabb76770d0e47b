//! Mapping of raw Bitcoin transactions into their display form

use serde::{Deserialize, Serialize};

use crate::math::checked_sum;
use crate::types::CONFIRMED_BTC_TRANSACTION_MIN_CONFIRMATIONS;

/// Input or output of a raw transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEndpoint {
    /// `None` for scripts without an address
    pub address: Option<String>,
    pub value: u64,
}

/// Transaction as reported by the uncertified source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinTransaction {
    pub hash: String,
    /// Block the transaction was mined in, absent while in the mempool
    pub block_height: Option<u32>,
    /// Unix seconds
    pub timestamp: Option<u64>,
    pub inputs: Vec<TxEndpoint>,
    pub outputs: Vec<TxEndpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Unconfirmed,
    Confirmed,
}

/// Transaction as shown to the user of `address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcTransactionUi {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Satoshis leaving (send) or reaching (receive) the wallet
    pub value: u64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: TransactionStatus,
    pub confirmations: u32,
    pub timestamp: Option<u64>,
}

fn is_address(endpoint: &TxEndpoint, address: &str) -> bool {
    endpoint.address.as_deref() == Some(address)
}

/// Confirmation depth of a transaction mined at `block_height`
pub fn transaction_confirmations(block_height: Option<u32>, latest_block_height: Option<u32>) -> u32 {
    match (block_height, latest_block_height) {
        (Some(height), Some(latest)) if latest >= height => latest - height + 1,
        _ => 0,
    }
}

/// Map a raw transaction relative to the wallet's `address`
///
/// A transaction is a send when any of its inputs belongs to `address`. Its
/// value is what went to other addresses; for a receive it is what reached
/// `address`.
pub fn map_btc_transaction(
    tx: &BitcoinTransaction,
    address: &str,
    latest_block_height: Option<u32>,
) -> BtcTransactionUi {
    let is_send = tx.inputs.iter().any(|input| is_address(input, address));

    let (kind, value, from, to) = if is_send {
        let external = tx.outputs.iter().filter(|output| !is_address(output, address));
        let value = checked_sum(external.clone().map(|output| output.value)).unwrap_or(u64::MAX);
        let to = external.filter_map(|output| output.address.clone()).next();
        (TransactionKind::Send, value, Some(address.to_string()), to)
    } else {
        let value = checked_sum(
            tx.outputs
                .iter()
                .filter(|output| is_address(output, address))
                .map(|output| output.value),
        )
        .unwrap_or(u64::MAX);
        let from = tx.inputs.iter().find_map(|input| input.address.clone());
        (TransactionKind::Receive, value, from, Some(address.to_string()))
    };

    let confirmations = transaction_confirmations(tx.block_height, latest_block_height);
    let status = match tx.block_height {
        None => TransactionStatus::Pending,
        Some(_) if confirmations >= CONFIRMED_BTC_TRANSACTION_MIN_CONFIRMATIONS => TransactionStatus::Confirmed,
        Some(_) => TransactionStatus::Unconfirmed,
    };

    BtcTransactionUi {
        id: tx.hash.clone(),
        kind,
        value,
        from,
        to,
        status,
        confirmations,
        timestamp: tx.timestamp,
    }
}
