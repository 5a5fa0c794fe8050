//! Orchestrator configuration.

use crate::constants::{
    RELAY_POLL_INTERVAL, RELAY_REQUEST_TIMEOUT, RPC_READ_RETRIES, RPC_READ_TIMEOUT,
};
use alloy::primitives::{Address, ChainId};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use url::Url;

/// Orchestrator configuration.
///
/// This is the explicit context handed to the coordinator at construction
/// time; nothing is read from ambient process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-chain configuration.
    pub chains: HashMap<ChainId, ChainConfig>,
    /// Bundling relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Read-only RPC policy.
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl OrchestratorConfig {
    /// Returns the configuration for the given chain, if supported.
    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }
}

/// Configuration of one supported chain.
///
/// The contract suite is deployed deterministically, so most addresses are
/// identical across chains; they are still configured per chain to support
/// test deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// RPC endpoint for the chain.
    pub rpc_url: Url,
    /// Directory contract resolving authoritative terminals and controllers.
    pub directory: Address,
    /// Controller used for operations on projects that do not exist yet.
    pub controller: Address,
    /// Swap-capable terminal used when the directory has no direct route for
    /// a payment token.
    pub swap_terminal: Address,
    /// Cross-chain peer deployer registry.
    pub sucker_registry: Address,
    /// Revnet deployer.
    pub revnet_deployer: Address,
}

/// Bundling relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Relay endpoint.
    pub endpoint: Url,
    /// Interval between bundle status polls.
    #[serde(with = "crate::serde::duration")]
    pub poll_interval: Duration,
    /// Timeout for relay HTTP requests.
    #[serde(with = "crate::serde::duration")]
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://relay.invalid").expect("static url"),
            poll_interval: RELAY_POLL_INTERVAL,
            request_timeout: RELAY_REQUEST_TIMEOUT,
        }
    }
}

/// Returns the canonical chain for an id, for display in logs and errors.
pub fn chain_name(chain_id: ChainId) -> alloy_chains::Chain {
    alloy_chains::Chain::from_id(chain_id)
}

/// Policy for read-only RPC calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    /// Timeout per read attempt.
    #[serde(with = "crate::serde::duration")]
    pub read_timeout: Duration,
    /// Additional attempts after a timed out read.
    pub read_retries: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { read_timeout: RPC_READ_TIMEOUT, read_retries: RPC_READ_RETRIES }
    }
}
