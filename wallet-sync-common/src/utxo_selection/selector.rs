//! Largest-first UTXO selection
//!
//! Candidates are ordered by value, largest first, and taken greedily until
//! the target is covered. The fee-aware variant re-estimates the fee after
//! every added input, since each input grows the transaction.
//!
//! # Usage
//!
//! ```
//! use wallet_sync_common::types::{Outpoint, Utxo};
//! use wallet_sync_common::utxo_selection::{select_utxos_with_fee, UtxoSelector};
//!
//! let utxos = vec![
//!     Utxo::new(Outpoint::new([1; 32], 0), 100_000, 10),
//!     Utxo::new(Outpoint::new([2; 32], 0), 300_000, 10),
//!     Utxo::new(Outpoint::new([3; 32], 0), 200_000, 10),
//! ];
//!
//! let result = select_utxos_with_fee(&utxos, 250_000, 10).unwrap();
//! assert_eq!(result.selected_utxos.len(), 1);
//! assert_eq!(result.change_amount, 48_600);
//!
//! let selector = UtxoSelector::with_fee_rate(10);
//! assert_eq!(selector.select(&utxos, 250_000).unwrap(), result);
//! ```

use serde_json::json;

use crate::logging::{log_selection, LogLevel};
use crate::math::{calculate_fee, checked_sum, DEFAULT_OUTPUT_COUNT};
use crate::types::Utxo;
use crate::utxo_selection::types::{SelectionError, SelectionResult};

pub use crate::math::estimate_transaction_size;

/// Select outputs covering `amount_satoshis`, ignoring fees
///
/// # Errors
/// * `NoUtxosAvailable` if `available` is empty
/// * `InsufficientFunds` if all candidates together fall short
pub fn select_utxos(available: &[Utxo], amount_satoshis: u64) -> Result<SelectionResult, SelectionError> {
    greedy_select(available, amount_satoshis, |_| Some(0))
}

/// Select outputs covering `amount_satoshis` plus the fee of spending them
///
/// The fee is `fee_rate * estimate_transaction_size(inputs, 2)`, assuming a
/// destination and a change output.
pub fn select_utxos_with_fee(
    available: &[Utxo],
    amount_satoshis: u64,
    fee_rate_sat_per_byte: u64,
) -> Result<SelectionResult, SelectionError> {
    greedy_select(available, amount_satoshis, |num_inputs| {
        calculate_fee(num_inputs, DEFAULT_OUTPUT_COUNT, fee_rate_sat_per_byte)
    })
}

/// Grow the selection one input at a time until it covers amount plus fee
///
/// `fee_for` returns `None` when the fee overflows, which makes the
/// current selection insufficient.
fn greedy_select<F>(available: &[Utxo], amount_satoshis: u64, fee_for: F) -> Result<SelectionResult, SelectionError>
where
    F: Fn(u32) -> Option<u64>,
{
    if available.is_empty() {
        log_selection(LogLevel::Debug, "Selection attempted without candidates", None);
        return Err(SelectionError::NoUtxosAvailable);
    }

    let mut candidates: Vec<&Utxo> = available.iter().collect();
    // sort_by is stable: equal values keep their original order
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected: Vec<Utxo> = Vec::new();
    let mut total: u64 = 0;
    let mut required = amount_satoshis;

    for utxo in candidates {
        let Some(sum) = total.checked_add(utxo.value) else {
            break;
        };
        total = sum;
        selected.push(utxo.clone());

        let num_inputs = u32::try_from(selected.len()).unwrap_or(u32::MAX);
        let Some(fee) = fee_for(num_inputs) else {
            required = u64::MAX;
            continue;
        };
        let Some(needed) = amount_satoshis.checked_add(fee) else {
            required = u64::MAX;
            continue;
        };
        required = needed;

        if total >= needed {
            log_selection(
                LogLevel::Debug,
                "UTXOs selected",
                Some(json!({
                    "inputs": selected.len(),
                    "total": total,
                    "amount": amount_satoshis,
                    "fee": fee,
                })),
            );
            return Ok(SelectionResult {
                selected_utxos: selected,
                total_input_value: total,
                change_amount: total - needed,
            });
        }
    }

    let available_total = checked_sum(available.iter().map(|utxo| utxo.value)).unwrap_or(u64::MAX);
    log_selection(
        LogLevel::Info,
        "Insufficient funds for selection",
        Some(json!({ "available": available_total, "required": required })),
    );
    Err(SelectionError::InsufficientFunds {
        available: available_total,
        required,
    })
}

/// Selection entry point bound to a fee rate
///
/// A rate of zero selects without fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtxoSelector {
    fee_rate_sat_per_byte: u64,
}

impl UtxoSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee_rate(fee_rate_sat_per_byte: u64) -> Self {
        Self {
            fee_rate_sat_per_byte,
        }
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate_sat_per_byte
    }

    pub fn select(&self, available: &[Utxo], amount_satoshis: u64) -> Result<SelectionResult, SelectionError> {
        if self.fee_rate_sat_per_byte == 0 {
            select_utxos(available, amount_satoshis)
        } else {
            select_utxos_with_fee(available, amount_satoshis, self.fee_rate_sat_per_byte)
        }
    }
}
