//! Retrieval of unspent outputs from the remote query endpoint
//!
//! A wallet addresses a *minter* (the service it sends bitcoin through);
//! each minter is backed by a bitcoin query endpoint for one network. The
//! [`MinterRegistry`] resolves the former to the latter and the injected
//! [`UtxoQuery`] performs the actual call.
//!
//! No filtering happens here: outputs are returned exactly as the endpoint
//! reports them.

use async_trait::async_trait;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::logging::{log_fetch, LogLevel};
use crate::network_status::SourceError;
use crate::types::{Identity, Utxo};

/// Default page size requested from the endpoint
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1_000;

/// Errors returned by the fetcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Unknown minter: {0}")]
    UnknownMinter(String),

    #[error("An authenticated identity is required to query UTXOs")]
    MissingIdentity,

    #[error("UTXO query failed: {0}")]
    Query(String),
}

impl From<SourceError> for FetchError {
    fn from(err: SourceError) -> Self {
        FetchError::Query(err.to_string())
    }
}

/// Query endpoint backing a minter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinEndpoint {
    pub bitcoin_canister_id: String,
    pub network: Network,
}

/// Mapping from minter identifiers to their query endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinterRegistry {
    endpoints: HashMap<String, BitcoinEndpoint>,
}

impl MinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, minter_canister_id: impl Into<String>, endpoint: BitcoinEndpoint) {
        self.endpoints.insert(minter_canister_id.into(), endpoint);
    }

    pub fn with_minter(mut self, minter_canister_id: impl Into<String>, endpoint: BitcoinEndpoint) -> Self {
        self.register(minter_canister_id, endpoint);
        self
    }

    pub fn resolve(&self, minter_canister_id: &str) -> Result<&BitcoinEndpoint, FetchError> {
        self.endpoints
            .get(minter_canister_id)
            .ok_or_else(|| FetchError::UnknownMinter(minter_canister_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Request sent to the query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUtxosRequest {
    pub address: String,
    pub network: Network,
    pub bitcoin_canister_id: String,
    /// Cursor returned as `next_page` by the previous response
    pub page: Option<Vec<u8>>,
}

/// Response shape of the query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUtxosResponse {
    pub utxos: Vec<Utxo>,
    pub tip_height: u32,
    pub tip_block_hash: Vec<u8>,
    pub next_page: Option<Vec<u8>>,
}

/// Transport used to reach the query endpoint
#[async_trait]
pub trait UtxoQuery: Send + Sync {
    async fn get_utxos(&self, identity: &Identity, request: GetUtxosRequest) -> Result<GetUtxosResponse, SourceError>;
}

/// Parameters shared by both fetch operations
#[derive(Debug, Clone)]
pub struct UtxoFetchParams {
    /// Caller identity; anonymous queries are refused
    pub identity: Option<Identity>,
    pub address: String,
    pub network: Network,
    pub minter_canister_id: String,
}

/// Result of a paginated fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedUtxos {
    pub utxos: Vec<Utxo>,
    /// Set when the total equals the batch size, in which case more outputs
    /// may exist than were returned
    pub possibly_truncated: bool,
}

/// UTXO fetcher bound to a registry and a query transport
pub struct UtxoFetcher<Q> {
    registry: MinterRegistry,
    query: Q,
}

impl<Q: UtxoQuery> UtxoFetcher<Q> {
    pub fn new(registry: MinterRegistry, query: Q) -> Self {
        Self { registry, query }
    }

    pub fn registry(&self) -> &MinterRegistry {
        &self.registry
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    fn prepare<'a>(&self, params: &'a UtxoFetchParams) -> Result<(&'a Identity, GetUtxosRequest), FetchError> {
        let endpoint = self.registry.resolve(&params.minter_canister_id)?;
        let identity = params.identity.as_ref().ok_or(FetchError::MissingIdentity)?;

        if endpoint.network != params.network {
            log_fetch(
                LogLevel::Warn,
                "Minter endpoint serves a different network than requested",
                Some(json!({
                    "minter": params.minter_canister_id,
                    "endpoint_network": endpoint.network.to_string(),
                    "requested_network": params.network.to_string(),
                })),
            );
        }

        Ok((
            identity,
            GetUtxosRequest {
                address: params.address.clone(),
                network: params.network,
                bitcoin_canister_id: endpoint.bitcoin_canister_id.clone(),
                page: None,
            },
        ))
    }

    /// Fetch a single page of outputs for an address
    pub async fn get_utxos(&self, params: &UtxoFetchParams) -> Result<Vec<Utxo>, FetchError> {
        let (identity, request) = self.prepare(params)?;
        let response = self.query.get_utxos(identity, request).await?;

        log_fetch(
            LogLevel::Debug,
            "Fetched UTXOs",
            Some(json!({
                "address": params.address,
                "count": response.utxos.len(),
                "tip_height": response.tip_height,
            })),
        );
        Ok(response.utxos)
    }

    /// Fetch every page of outputs for an address
    ///
    /// Stops at the first page shorter than `max_batch_size` or without a
    /// continuation cursor. A `max_batch_size` of zero is treated as one.
    pub async fn get_all_utxos_paginated(
        &self,
        params: &UtxoFetchParams,
        max_batch_size: usize,
    ) -> Result<PaginatedUtxos, FetchError> {
        let max_batch_size = max_batch_size.max(1);
        let (identity, mut request) = self.prepare(params)?;

        let mut utxos = Vec::new();
        loop {
            let response = self.query.get_utxos(identity, request.clone()).await?;
            let page_len = response.utxos.len();
            utxos.extend(response.utxos);

            match response.next_page {
                Some(cursor) if page_len >= max_batch_size => request.page = Some(cursor),
                _ => break,
            }
        }

        let possibly_truncated = utxos.len() == max_batch_size;
        if possibly_truncated {
            log_fetch(
                LogLevel::Warn,
                "Retrieved exactly the batch size, more UTXOs may exist",
                Some(json!({
                    "address": params.address,
                    "max_batch_size": max_batch_size,
                })),
            );
        }

        Ok(PaginatedUtxos {
            utxos,
            possibly_truncated,
        })
    }
}
