//! Wallet Sync Common Library
//!
//! UTXO selection and background balance synchronization for a Bitcoin
//! wallet client.
//!
//! # Modules
//!
//! - `types`: Core domain types (outpoints, UTXOs, identities, certified data)
//! - `math`: Transaction size and fee arithmetic
//! - `fee_estimation`: Fee rate derivation from endpoint percentiles
//! - `utxo_selection`: Confirmation/lock filtering and largest-first selection
//! - `utxo_fetcher`: Paginated UTXO retrieval from the query endpoint
//! - `utxo_management`: Spend preparation for the send flow
//! - `scheduler`: Identity-gated periodic job runner
//! - `wallet_sync`: Dual-source balance and transaction synchronization
//! - `pending`: Pending sent transactions and their derived status
//! - `context`: Wallet-scoped stores and their lifecycle
//! - `events`: In-process message bus
//! - `network_status`: External data source traits
//! - `config`: TOML configuration
//! - `logging`: Structured logging
//! - `error`: Crate-wide error type

/// Core domain types
pub mod types;

/// Transaction size and fee arithmetic
pub mod math;

/// Structured logging
pub mod logging;

/// Crate-wide error type
pub mod error;

/// Configuration management
pub mod config;

/// In-process message bus
pub mod events;

/// External data source traits
pub mod network_status;

/// Fee rate derivation
pub mod fee_estimation;

/// UTXO filtering and selection
pub mod utxo_selection;

/// Paginated UTXO retrieval
pub mod utxo_fetcher;

/// Spend preparation
pub mod utxo_management;

/// Periodic job runner
pub mod scheduler;

/// Pending sent transactions
pub mod pending;

/// Wallet-scoped stores
pub mod context;

/// Bitcoin wallet synchronization
pub mod wallet_sync;

pub use bitcoin::Network;

pub use types::{CertifiedData, Identity, Outpoint, Utxo};

pub use error::{ErrorCategory, SyncError, SyncResult};

pub use utxo_selection::{
    estimate_transaction_size, filter_locked_utxos, filter_utxos, select_utxos, select_utxos_with_fee,
    SelectionError, SelectionResult, UtxoFilterOptions, UtxoSelector,
};

pub use utxo_fetcher::{FetchError, MinterRegistry, UtxoFetcher, UtxoQuery};

pub use utxo_management::{prepare_btc_send, PrepareBtcSendParams, UtxosFee, UtxosFeeError};

pub use scheduler::{IdentityProvider, Job, JobContext, SchedulerInterval, SchedulerState, SchedulerTimer};

pub use pending::{pending_sent_transactions_status, PendingSentTransactionsStatus};

pub use context::WalletContext;

pub use wallet_sync::{BtcWalletSyncData, BtcWalletSyncJob, BtcWalletSyncWorker};

pub use events::{MessageBus, WorkerMessage};

pub use config::SyncConfig;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization with default logging
///
/// Safe to call multiple times.
pub fn init() -> Result<(), String> {
    init_with_config(&logging::LogConfig::default())
}

/// Create a default configuration at `path` if needed, then load it
pub fn load_config(path: impl AsRef<std::path::Path>) -> SyncResult<SyncConfig> {
    let path = path.as_ref();
    config::ensure_config_exists(path)
        .and_then(|_| SyncConfig::load(path))
        .map_err(|e| SyncError::Config(format!("{:#}", e)))
}

/// Library initialization with the given logging configuration
pub fn init_with_config(config: &logging::LogConfig) -> Result<(), String> {
    logging::init(config).map_err(|e| format!("Failed to initialize logging: {}", e))
}
