//! Wire types for the bundling relay HTTP API.
//!
//! The relay accepts a multi-chain operation description, quotes which chains
//! can cover the aggregate gas, and executes across chains on the client's
//! behalf once a payment chain is chosen.

use super::PaymentOption;
use alloy::primitives::{Address, Bytes, ChainId, TxHash, U256};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// One pre-built transaction of a bundle creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTransactionRequest {
    /// Chain the transaction targets.
    #[serde(with = "alloy::serde::quantity")]
    pub chain_id: ChainId,
    /// Call target.
    pub target: Address,
    /// ABI-encoded call data.
    pub data: Bytes,
    /// Native value attached to the call.
    pub value: U256,
}

/// Request body for creating a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayBundleRequest {
    /// The account the bundle executes on behalf of.
    pub from: Address,
    /// One transaction per target chain.
    pub transactions: Vec<RelayTransactionRequest>,
}

/// A created bundle, as returned by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayBundle {
    /// The relay's identifier for the bundle.
    pub bundle_uuid: String,
    /// Chains offering to cover the bundle's aggregate gas, with the required
    /// native amount on each.
    #[serde(default)]
    pub payment_options: Vec<PaymentOption>,
    /// Whether the relay sponsors the bundle outright. When set, the option
    /// list is empty and no payment chain selection is needed.
    #[serde(default)]
    pub sponsored: bool,
}

/// The status code of one chain within a relay bundle.
#[derive(Debug, Clone, Copy, Serialize_repr, Deserialize_repr, Eq, PartialEq)]
#[repr(u16)]
pub enum RelayChainStatusCode {
    /// Queued, not yet broadcast.
    Queued = 100,
    /// Broadcast, awaiting confirmation.
    Submitted = 200,
    /// Confirmed on chain.
    Confirmed = 300,
    /// Failed.
    Failed = 400,
}

/// Per-chain status as reported by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayChainStatus {
    /// The chain this status refers to.
    #[serde(with = "alloy::serde::quantity")]
    pub chain_id: ChainId,
    /// Status code.
    pub status: RelayChainStatusCode,
    /// Transaction hash, once broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    /// Project id resolved on this chain, for project-creating operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Failure message, if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full bundle status as reported by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayBundleStatus {
    /// The relay's identifier for the bundle.
    pub bundle_uuid: String,
    /// Per-chain statuses, in no guaranteed order.
    pub chains: Vec<RelayChainStatus>,
}
