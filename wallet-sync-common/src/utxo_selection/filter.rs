//! Eligibility filters applied before selection
//!
//! Both filters are pure: they borrow the candidate set, keep the original
//! order and return new vectors.

use std::collections::HashSet;

use crate::types::Utxo;
use crate::utxo_selection::types::UtxoFilterOptions;

/// Keep confirmed outputs whose txid is not excluded
///
/// An output survives when its confirmation depth is at least
/// `min_confirmations` and its lower-case hex txid is not listed in
/// `exclude_txids`. See [`UtxoFilterOptions::tip_height`] for how the depth
/// is derived.
pub fn filter_utxos(utxos: &[Utxo], options: &UtxoFilterOptions) -> Vec<Utxo> {
    utxos
        .iter()
        .filter(|utxo| confirmation_depth(utxo, options.tip_height) >= options.min_confirmations)
        .filter(|utxo| !options.exclude_txids.contains(&utxo.outpoint.txid_hex()))
        .cloned()
        .collect()
}

/// Remove outputs already consumed by an in-flight spend
///
/// `pending_txids` holds lower-case hex txids of outputs spent by
/// transactions that have been broadcast but not yet confirmed.
pub fn filter_locked_utxos(utxos: &[Utxo], pending_txids: &HashSet<String>) -> Vec<Utxo> {
    if pending_txids.is_empty() {
        return utxos.to_vec();
    }

    utxos
        .iter()
        .filter(|utxo| !pending_txids.contains(&utxo.outpoint.txid_hex()))
        .cloned()
        .collect()
}

fn confirmation_depth(utxo: &Utxo, tip_height: Option<u32>) -> u32 {
    match tip_height {
        Some(tip) => utxo.confirmations(tip),
        None => utxo.height,
    }
}
