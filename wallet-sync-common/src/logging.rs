//! Logging infrastructure for the synchronization layer
//!
//! Thin structured layer on top of the `log` facade with `env_logger` as
//! the backend. Every entry is tagged with the component that produced it
//! and addresses, txids and principals passed as parameters are shortened
//! before they are written.
//!
//! # Usage
//!
//! ```
//! use wallet_sync_common::logging::{self, LogConfig, LogLevel};
//! use serde_json::json;
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//!
//! logging::log_sync(
//!     LogLevel::Info,
//!     "Balance refreshed",
//!     Some(json!({ "address": "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4" })),
//! );
//! ```

use chrono::Local;
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write as IoWrite;
use std::sync::Once;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Component that produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogContext {
    /// Periodic job runner
    Scheduler,
    /// Balance and transaction synchronization
    Sync,
    /// UTXO filtering, selection and fee computation
    Selection,
    /// UTXO retrieval from the query endpoint
    Fetch,
}

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level
    pub level: LogLevel,
    /// Whether to include timestamps in log messages
    pub include_timestamps: bool,
    /// Whether to include source location in log messages
    pub include_source_location: bool,
    /// Whether to use JSON format for logs (machine-readable)
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_timestamps: true,
            include_source_location: false,
            json_format: false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

static LOGGING_INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call installs the logger.
/// A logger installed by someone else (for instance a test harness) is
/// accepted silently, so this currently always returns `Ok`.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let include_timestamps = config.include_timestamps;
    let include_source_location = config.include_source_location;
    let json_format = config.json_format;
    let level = config.level;

    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level.into());

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            let source_location = if include_source_location {
                format!(
                    " [{}:{}]",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0)
                )
            } else {
                String::new()
            };

            if json_format {
                let line = json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "location": source_location,
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            } else {
                if include_timestamps {
                    write!(buf, "{} ", timestamp)?;
                }
                writeln!(buf, "[{}{}] {}", record.level(), source_location, record.args())
            }
        });

        // try_init only fails when another logger is already installed
        if builder.try_init().is_err() {
            debug!("Logger already initialized, using existing instance");
        }
    });

    Ok(())
}

/// Update the log level dynamically
/// Shorten a potentially identifying string for logging
///
/// Keeps the first and last six characters of addresses and txids so log
/// lines stay correlatable without carrying the full value.
pub fn sanitize_for_logging(input: &str) -> String {
    let len = input.chars().count();
    if len <= 16 {
        return input.to_string();
    }

    let first: String = input.chars().take(6).collect();
    let last: String = input.chars().skip(len - 6).collect();
    format!("{}...{}", first, last)
}

/// Parameter keys whose string values identify a user or a coin
const SENSITIVE_KEYS: &[&str] = &["address", "txid", "principal", "identity"];

fn sanitize_params(params: serde_json::Value) -> serde_json::Value {
    match params {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) if SENSITIVE_KEYS.contains(&k.as_str()) => {
                        let sanitized = sanitize_for_logging(&s);
                        (k, json!(sanitized))
                    }
                    other => (k, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn log_with_context(
    level: LogLevel,
    context: LogContext,
    message: &str,
    params: Option<serde_json::Value>,
) {
    let level = log::Level::from(level);
    match params.map(sanitize_params) {
        Some(params) => log::log!(level, "[{:?}] {} - {}", context, message, params),
        None => log::log!(level, "[{:?}] {}", context, message),
    }
}

/// Log a scheduler event
pub fn log_scheduler(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Scheduler, message, params);
}

/// Log a balance/transaction synchronization event
pub fn log_sync(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Sync, message, params);
}

/// Log a UTXO selection event
pub fn log_selection(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Selection, message, params);
}

/// Log a UTXO retrieval event
pub fn log_fetch(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    log_with_context(level, LogContext::Fetch, message, params);
}
