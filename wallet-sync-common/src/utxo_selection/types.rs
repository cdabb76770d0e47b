//! Core types for UTXO filtering and selection
//!
//! - [`UtxoFilterOptions`]: which candidates are eligible for spending
//! - [`SelectionResult`]: the outputs chosen to fund a spend
//! - [`SelectionError`]: why no selection could be made

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::types::Utxo;

/// Default number of confirmations required before an output is spendable
pub const DEFAULT_MIN_CONFIRMATIONS: u32 = 6;

/// Options controlling which UTXOs survive [`filter_utxos`](super::filter_utxos)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoFilterOptions {
    /// Minimum confirmations an output must have
    pub min_confirmations: u32,
    /// Lower-case hex txids whose outputs must not be used
    pub exclude_txids: HashSet<String>,
    /// Chain tip used to turn `height` into a confirmation depth
    ///
    /// When absent, `height` itself is used as the confirmation count.
    pub tip_height: Option<u32>,
}

impl Default for UtxoFilterOptions {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            exclude_txids: HashSet::new(),
            tip_height: None,
        }
    }
}

impl UtxoFilterOptions {
    pub fn with_min_confirmations(mut self, min_confirmations: u32) -> Self {
        self.min_confirmations = min_confirmations;
        self
    }

    pub fn with_excluded_txids<I, S>(mut self, txids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_txids = txids
            .into_iter()
            .map(|txid| txid.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_tip_height(mut self, tip_height: u32) -> Self {
        self.tip_height = Some(tip_height);
        self
    }
}

/// Outputs chosen to fund a spend
///
/// Invariant: `total_input_value >= amount + fee` and
/// `change_amount == total_input_value - amount - fee`, where `fee` is zero
/// for plain selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected outputs, largest value first
    pub selected_utxos: Vec<Utxo>,
    /// Sum of the selected values in satoshis
    pub total_input_value: u64,
    /// Value returned to the wallet in satoshis
    pub change_amount: u64,
}

impl SelectionResult {
    /// Fee implied by the selection for a given spend amount
    pub fn implied_fee(&self, amount_satoshis: u64) -> u64 {
        self.total_input_value
            .saturating_sub(amount_satoshis)
            .saturating_sub(self.change_amount)
    }
}

/// Reasons a selection cannot be made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No UTXOs available for selection")]
    NoUtxosAvailable,

    /// `required` includes the fee for fee-aware selection
    #[error("Insufficient funds: required {required} satoshis, available {available} satoshis")]
    InsufficientFunds { available: u64, required: u64 },
}
