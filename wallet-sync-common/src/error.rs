//! Standardized error handling for the wallet synchronization layer
//!
//! Each component reports failures with its own error enum. This module
//! gathers them into [`SyncError`] and classifies them with
//! [`ErrorCategory`], which mirrors how failures are meant to be handled:
//!
//! - **Input** errors are caller misuse (no UTXOs, insufficient funds,
//!   unknown minter, missing identity). They surface directly to the
//!   caller and are never retried.
//! - **Transient** errors come from remote services. Inside the wallet
//!   sync job they are reported and the schedule keeps running.
//! - **Fatal** errors escape a scheduled job and halt its timer.
//!
//! # Usage
//!
//! ```
//! use wallet_sync_common::error::{ErrorCategory, SyncError};
//! use wallet_sync_common::utxo_selection::SelectionError;
//!
//! let err: SyncError = SelectionError::NoUtxosAvailable.into();
//! assert_eq!(err.category(), ErrorCategory::Input);
//! ```

use crate::network_status::SourceError;
use crate::utxo_fetcher::FetchError;
use crate::utxo_selection::SelectionError;
use std::io;
use thiserror::Error;

/// The main error type of the crate
#[derive(Debug, Error)]
pub enum SyncError {
    /// UTXO selection failed
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// UTXO retrieval failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A remote data source failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// A scheduled job failed and halted its timer
    #[error("Job error: {context}")]
    Job {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Type alias for a Result with SyncError
pub type SyncResult<T> = Result<T, SyncError>;

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        SyncError::Io {
            context: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization {
            context: format!("JSON serialization error: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Serialization {
            context: format!("TOML deserialization error: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

/// Wrap a job failure with the name of the scheduler that ran it
pub fn job_error(context: impl Into<String>, source: anyhow::Error) -> SyncError {
    SyncError::Job {
        context: context.into(),
        source,
    }
}

/// Error category used for logging and for deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller misuse, surfaced synchronously and never retried
    Input,
    /// Remote service failure, isolated per data source
    Transient,
    /// Uncaught job failure, halts the owning schedule
    Fatal,
    /// Invalid configuration
    Config,
    /// Malformed data
    Serialization,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "Input",
            ErrorCategory::Transient => "Transient",
            ErrorCategory::Fatal => "Fatal",
            ErrorCategory::Config => "Config",
            ErrorCategory::Serialization => "Serialization",
        }
    }
}

impl SyncError {
    /// Get the category of this error for logging and handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Selection(_) => ErrorCategory::Input,
            SyncError::Fetch(FetchError::Query(_)) => ErrorCategory::Transient,
            SyncError::Fetch(_) => ErrorCategory::Input,
            SyncError::Source(_) => ErrorCategory::Transient,
            SyncError::Job { .. } => ErrorCategory::Fatal,
            SyncError::Config(_) => ErrorCategory::Config,
            SyncError::Serialization { .. } => ErrorCategory::Serialization,
            SyncError::Io { .. } => ErrorCategory::Transient,
        }
    }

    /// Get a message suitable for displaying to users
    ///
    /// Remote failures are reported generically; the detailed message is
    /// only written to the log.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Selection(SelectionError::NoUtxosAvailable) => {
                "No spendable outputs are available".to_string()
            }
            SyncError::Selection(SelectionError::InsufficientFunds { .. }) => {
                "Insufficient funds for this transaction".to_string()
            }
            SyncError::Fetch(FetchError::MissingIdentity) => {
                "You must be signed in to perform this operation".to_string()
            }
            SyncError::Fetch(FetchError::UnknownMinter(_)) => {
                "This token is not supported on the selected network".to_string()
            }
            SyncError::Fetch(FetchError::Query(_)) | SyncError::Source(_) | SyncError::Io { .. } => {
                "The Bitcoin network service is temporarily unavailable".to_string()
            }
            SyncError::Job { context, .. } => format!("Synchronization stopped: {}", context),
            SyncError::Config(message) => format!("Configuration error: {}", message),
            SyncError::Serialization { context, .. } => format!("Data format error: {}", context),
        }
    }
}
