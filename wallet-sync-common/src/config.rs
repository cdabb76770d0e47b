//! Configuration for the synchronization layer
//!
//! Settings are stored in TOML. Every section and field has a default, so
//! an empty file is a valid configuration:
//!
//! ```toml
//! [scheduler]
//! interval_secs = 60        # 0 disables the recurring timer
//!
//! [utxos]
//! min_confirmations = 6
//! max_batch_size = 1000
//!
//! [network]
//! testnets_enabled = false
//!
//! [minters.mqygn-kiaaa-aaaar-qaadq-cai]
//! bitcoin_canister_id = "ghsi2-tqaaa-aaaan-aaaca-cai"
//! network = "bitcoin"
//! ```

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::events::MessageBus;
use crate::logging::LogConfig;
use crate::scheduler::SchedulerInterval;
use crate::types::parse_network;
use crate::utxo_fetcher::{BitcoinEndpoint, MinterRegistry, DEFAULT_MAX_BATCH_SIZE};
use crate::utxo_selection::{UtxoFilterOptions, DEFAULT_MIN_CONFIRMATIONS};

/// Tag published on the bus after the configuration was saved
pub const CONFIG_SAVED_MSG: &str = "configSaved";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub utxos: UtxoConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub logging: LogConfig,

    /// Minter identifier to query endpoint
    #[serde(default)]
    pub minters: HashMap<String, MinterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoConfig {
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,

    /// Page size requested when fetching every UTXO of an address
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for UtxoConfig {
    fn default() -> Self {
        Self {
            min_confirmations: default_min_confirmations(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Track testnet and regtest addresses alongside mainnet
    #[serde(default)]
    pub testnets_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterConfig {
    pub bitcoin_canister_id: String,
    /// `bitcoin`, `testnet`, `regtest` or `signet`
    pub network: String,
}

impl SyncConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, announcing it on `message_bus` if given
    pub fn save(&self, path: impl AsRef<Path>, message_bus: Option<&MessageBus>) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        if let Some(bus) = message_bus {
            bus.publish(
                CONFIG_SAVED_MSG,
                json!({
                    "path": path.display().to_string(),
                    "interval_secs": self.scheduler.interval_secs,
                    "testnets_enabled": self.network.testnets_enabled,
                    "minters": self.minters.len(),
                }),
            );
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.utxos.max_batch_size == 0 {
            bail!("Invalid max batch size: must be greater than 0");
        }

        for (minter, endpoint) in &self.minters {
            if endpoint.bitcoin_canister_id.trim().is_empty() {
                bail!("Minter {} has an empty bitcoin canister id", minter);
            }
            if parse_network(&endpoint.network).is_none() {
                bail!("Minter {} has an invalid network: {}", minter, endpoint.network);
            }
        }

        Ok(())
    }

    pub fn scheduler_interval(&self) -> SchedulerInterval {
        SchedulerInterval::from_secs(self.scheduler.interval_secs)
    }

    /// Options for [`crate::utxo_management::prepare_btc_send`]
    pub fn filter_options(&self) -> UtxoFilterOptions {
        UtxoFilterOptions::default().with_min_confirmations(self.utxos.min_confirmations)
    }

    pub fn minter_registry(&self) -> Result<MinterRegistry> {
        let mut registry = MinterRegistry::new();
        for (minter, endpoint) in &self.minters {
            let network = parse_network(&endpoint.network)
                .ok_or_else(|| anyhow!("Minter {} has an invalid network: {}", minter, endpoint.network))?;
            registry.register(
                minter.clone(),
                BitcoinEndpoint {
                    bitcoin_canister_id: endpoint.bitcoin_canister_id.clone(),
                    network,
                },
            );
        }
        Ok(registry)
    }
}

/// Write a default configuration to `path` unless a file is already there
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
        }
    }

    let content = toml::to_string_pretty(&SyncConfig::default())
        .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;
    fs::write(path, content).map_err(|e| anyhow!("Failed to write default config file: {}", e))?;

    Ok(())
}

fn default_interval_secs() -> u64 {
    60
}

fn default_min_confirmations() -> u32 {
    DEFAULT_MIN_CONFIRMATIONS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}
