//! Spend preparation for the send flow
//!
//! Combines the pending-transaction status, the UTXO filters and fee-aware
//! selection into a single [`UtxosFee`] that a send form can render. Failures
//! are reported in [`UtxosFee::error`] instead of being returned as errors.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

use crate::logging::{log_selection, LogLevel};
use crate::math::checked_sum;
use crate::pending::PendingSentTransactionsStatus;
use crate::types::Utxo;
use crate::utxo_selection::{
    filter_locked_utxos, filter_utxos, select_utxos_with_fee, SelectionError, UtxoFilterOptions,
};

/// Why a spend cannot be prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxosFeeError {
    /// A previous spend may still be in flight, or its status is unknown
    PendingTransactions,
    /// No spendable outputs remain after filtering
    NoUtxos,
    /// The spendable outputs do not cover the amount
    InsufficientBalance,
    /// The spendable outputs cover the amount but not the fee
    InsufficientBalanceForFee,
}

/// Fee and inputs of a prepared spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxosFee {
    pub fee_satoshis: u64,
    pub utxos: Vec<Utxo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<UtxosFeeError>,
}

impl UtxosFee {
    fn failed(error: UtxosFeeError) -> Self {
        Self {
            fee_satoshis: 0,
            utxos: Vec::new(),
            error: Some(error),
        }
    }
}

/// Inputs of [`prepare_btc_send`]
#[derive(Debug, Clone)]
pub struct PrepareBtcSendParams<'a> {
    pub utxos: &'a [Utxo],
    pub amount_satoshis: u64,
    pub fee_rate_satoshis_per_byte: u64,
    pub pending_status: PendingSentTransactionsStatus,
    /// Txids spent by pending transactions of the sending address
    pub pending_txids: &'a HashSet<String>,
    pub options: &'a UtxoFilterOptions,
}

/// Compute the inputs and fee for a spend
///
/// Only a `None` pending status allows a spend; `Loading`, `Error` and
/// `Some` all report [`UtxosFeeError::PendingTransactions`].
pub fn prepare_btc_send(params: PrepareBtcSendParams<'_>) -> UtxosFee {
    if params.pending_status != PendingSentTransactionsStatus::None {
        log_selection(
            LogLevel::Info,
            "Spend blocked by pending transactions",
            Some(json!({ "status": format!("{:?}", params.pending_status) })),
        );
        return UtxosFee::failed(UtxosFeeError::PendingTransactions);
    }

    let confirmed = filter_utxos(params.utxos, params.options);
    let spendable = filter_locked_utxos(&confirmed, params.pending_txids);

    match select_utxos_with_fee(&spendable, params.amount_satoshis, params.fee_rate_satoshis_per_byte) {
        Ok(selection) => UtxosFee {
            fee_satoshis: selection.implied_fee(params.amount_satoshis),
            utxos: selection.selected_utxos,
            error: None,
        },
        Err(SelectionError::NoUtxosAvailable) => UtxosFee::failed(UtxosFeeError::NoUtxos),
        Err(SelectionError::InsufficientFunds { .. }) => {
            let total = checked_sum(spendable.iter().map(|utxo| utxo.value)).unwrap_or(u64::MAX);
            if total < params.amount_satoshis {
                UtxosFee::failed(UtxosFeeError::InsufficientBalance)
            } else {
                UtxosFee::failed(UtxosFeeError::InsufficientBalanceForFee)
            }
        }
    }
}
