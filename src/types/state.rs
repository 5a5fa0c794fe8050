//! Bundle and per-chain state.
//!
//! All state in this module is owned exclusively by the bundle coordinator and
//! mutated only through its transition functions; callers receive snapshots.

use alloy::primitives::{ChainId, TxHash, U256, wrap_fixed_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

wrap_fixed_bytes! {
    /// An identifier for an operation bundle.
    ///
    /// Every submission gets one, including single-chain sequential runs, so
    /// the caller API is uniform across execution modes. Callers should treat
    /// this as an opaque value.
    pub struct BundleId<32>;
}

/// Status of one chain's progress through an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainStatus {
    /// Not started yet.
    ///
    /// Next: [`Self::Signing`]
    #[default]
    Pending,
    /// Waiting on a signing action (chain switch, allowance, transaction).
    ///
    /// Next: [`Self::Submitted`] OR [`Self::Failed`] OR [`Self::Cancelled`]
    Signing,
    /// Broadcast to the chain, awaiting confirmation.
    ///
    /// Next: [`Self::Confirmed`] OR [`Self::Failed`]
    Submitted,
    /// Confirmed on chain.
    ///
    /// Terminal state.
    Confirmed,
    /// Failed for this chain.
    ///
    /// Terminal state. Never retried automatically; the whole operation must
    /// be re-invoked.
    Failed,
    /// Abandoned by the user.
    ///
    /// Terminal state, surfaced as neutral rather than as a failure. Counts
    /// as unsuccessful for bundle aggregation.
    Cancelled,
}

impl ChainStatus {
    /// Whether the status is final.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }

    /// Whether the chain is still in flight.
    pub fn is_in_flight(&self) -> bool {
        !self.is_final()
    }
}

/// Progress of one chain within a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    /// The chain.
    pub chain_id: ChainId,
    /// Current status.
    pub status: ChainStatus,
    /// Transaction hash, once submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    /// Error message for [`ChainStatus::Failed`], truncated for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Project id resolved on this chain.
    ///
    /// Bundled project creation can yield a different id per chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// When work on this chain started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When this chain reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ChainState {
    /// Creates a fresh pending state for a chain.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            status: ChainStatus::Pending,
            tx_hash: None,
            error: None,
            project_id: None,
            started_at: None,
            finalized_at: None,
        }
    }
}

/// An offer from the relay to cover the bundle's aggregate gas from one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    /// Chain the payment would be made on.
    pub chain_id: ChainId,
    /// Required native-currency amount on that chain.
    pub amount: U256,
}

/// Overall status of a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleStatus {
    /// Nothing submitted yet.
    ///
    /// Next: [`Self::Creating`] (bundled) OR [`Self::Processing`] (sequential)
    #[default]
    Idle,
    /// The request was handed to the relay.
    ///
    /// Next: [`Self::AwaitingPayment`] OR [`Self::Processing`] OR [`Self::Failed`]
    Creating,
    /// The relay returned payment options; a payment chain must be selected.
    ///
    /// Next: [`Self::Processing`]
    AwaitingPayment,
    /// Chains are executing.
    ///
    /// Next: [`Self::Completed`] OR [`Self::Failed`]
    Processing,
    /// Every chain confirmed.
    ///
    /// Terminal state.
    Completed,
    /// At least one chain failed and none remain in flight.
    ///
    /// Terminal state. Derived purely from chain states, never set directly.
    Failed,
}

impl BundleStatus {
    /// Whether the status is final.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one bundle's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleState {
    /// The coordinator-assigned bundle id.
    pub id: BundleId,
    /// The relay's bundle identifier. Present only in bundled mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_bundle_id: Option<String>,
    /// Overall status.
    pub status: BundleStatus,
    /// Per-chain progress, in the request's target-chain order.
    pub chains: Vec<ChainState>,
    /// Payment options offered by the relay.
    #[serde(default)]
    pub payment_options: Vec<PaymentOption>,
    /// The selected payment chain, once chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_chain: Option<ChainId>,
    /// Bundle-level error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BundleState {
    /// Creates an idle bundle state with one pending entry per target chain,
    /// in target order.
    pub fn new(id: BundleId, chains: &[ChainId]) -> Self {
        Self {
            id,
            relay_bundle_id: None,
            status: BundleStatus::Idle,
            chains: chains.iter().copied().map(ChainState::new).collect(),
            payment_options: Vec::new(),
            payment_chain: None,
            error: None,
        }
    }

    /// Returns the state of the given chain, if it is part of the bundle.
    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainState> {
        self.chains.iter().find(|chain| chain.chain_id == chain_id)
    }

    /// Returns a mutable reference to the state of the given chain.
    pub(crate) fn chain_mut(&mut self, chain_id: ChainId) -> Option<&mut ChainState> {
        self.chains.iter_mut().find(|chain| chain.chain_id == chain_id)
    }

    /// Derives the aggregate status from the per-chain states once execution
    /// has begun.
    ///
    /// `completed` iff every chain is confirmed; `failed` iff at least one
    /// chain failed (or was cancelled) and none remain in flight; `processing`
    /// otherwise. Pre-execution phases (idle, creating, awaiting payment) are
    /// not derived and must be set by the coordinator's own transitions.
    pub fn aggregate_status(&self) -> BundleStatus {
        if self.chains.iter().all(|chain| chain.status == ChainStatus::Confirmed) {
            return BundleStatus::Completed;
        }
        let any_unsuccessful = self
            .chains
            .iter()
            .any(|chain| matches!(chain.status, ChainStatus::Failed | ChainStatus::Cancelled));
        let any_in_flight = self.chains.iter().any(|chain| chain.status.is_in_flight());
        if any_unsuccessful && !any_in_flight {
            BundleStatus::Failed
        } else {
            BundleStatus::Processing
        }
    }
}
