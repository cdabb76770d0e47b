//! UTXO selection module
//!
//! Turns a fetched set of unspent outputs into a spend plan:
//!
//! - `filter.rs` - drops unconfirmed outputs and outputs locked by pending spends
//! - `selector.rs` - largest-first selection, with or without fees
//! - `types.rs` - options, results and errors
//!
//! Everything here is pure. Inputs are borrowed and never mutated; each
//! call returns fresh values.

pub mod filter;
pub mod selector;
pub mod types;

pub use filter::{filter_locked_utxos, filter_utxos};
pub use selector::{estimate_transaction_size, select_utxos, select_utxos_with_fee, UtxoSelector};
pub use types::{SelectionError, SelectionResult, UtxoFilterOptions, DEFAULT_MIN_CONFIRMATIONS};
