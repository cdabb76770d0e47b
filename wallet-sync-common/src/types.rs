//! Core domain types shared by the selection and synchronization layers
//!
//! These types describe the data that flows between the remote query
//! endpoint, the UTXO selection engine and the synchronization jobs.
//! All of them are plain values: they are created per request and never
//! mutated once handed to another component.

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bytes of a transaction id as returned by the query endpoint
pub const TXID_LEN: usize = 32;

/// Confirmations after which a transaction is displayed as confirmed
pub const CONFIRMED_BTC_TRANSACTION_MIN_CONFIRMATIONS: u32 = 6;

/// Reference to a specific output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// Transaction id bytes, in the order delivered by the query endpoint
    #[serde(with = "hex_txid")]
    pub txid: [u8; TXID_LEN],
    /// Output index
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: [u8; TXID_LEN], vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Lower-case hex encoding of the txid bytes
    ///
    /// This is the representation used by pending-transaction bookkeeping
    /// and by the `exclude_txids` filter option.
    pub fn txid_hex(&self) -> String {
        hex::encode(self.txid)
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid_hex(), self.vout)
    }
}

/// Unspent transaction output as returned by the query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Amount in satoshis
    pub value: u64,
    /// Block height of the output, used as a confirmation proxy
    pub height: u32,
    /// Output being referenced
    pub outpoint: Outpoint,
}

impl Utxo {
    pub fn new(outpoint: Outpoint, value: u64, height: u32) -> Self {
        Self {
            value,
            height,
            outpoint,
        }
    }

    /// Confirmation depth relative to the given chain tip
    ///
    /// A height of zero means the output is still in the mempool. Outputs
    /// reported above the tip are treated as unconfirmed.
    pub fn confirmations(&self, tip_height: u32) -> u32 {
        if self.height == 0 || self.height > tip_height {
            return 0;
        }
        tip_height - self.height + 1
    }
}

/// Authenticated identity used for certified calls
///
/// The identity is opaque to this crate; it is only forwarded to the
/// external collaborators. Only its principal text is ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    principal: String,
}

impl Identity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.principal)
    }
}

/// A value tagged with whether it came from the certified source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedData<T> {
    pub data: T,
    pub certified: bool,
}

impl<T> CertifiedData<T> {
    pub fn certified(data: T) -> Self {
        Self {
            data,
            certified: true,
        }
    }

    pub fn uncertified(data: T) -> Self {
        Self {
            data,
            certified: false,
        }
    }
}

/// Networks a wallet tracks an address for
///
/// Mainnet is always tracked; testnet and regtest only when test networks
/// are enabled in the configuration.
pub fn tracked_networks(testnets_enabled: bool) -> Vec<Network> {
    if testnets_enabled {
        vec![Network::Bitcoin, Network::Testnet, Network::Regtest]
    } else {
        vec![Network::Bitcoin]
    }
}

/// Parse a network name as it appears in configuration files
pub fn parse_network(name: &str) -> Option<Network> {
    match name.to_lowercase().as_str() {
        "bitcoin" | "mainnet" => Some(Network::Bitcoin),
        "testnet" => Some(Network::Testnet),
        "regtest" => Some(Network::Regtest),
        "signet" => Some(Network::Signet),
        _ => None,
    }
}

mod hex_txid {
    use super::TXID_LEN;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(txid: &[u8; TXID_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(txid))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; TXID_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("txid must be 32 bytes"))
    }
}
