use crate::types::{Acknowledgement, BundleId};
use alloy::primitives::ChainId;
use thiserror::Error;

/// Errors returned by the bundle coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The verification gate blocked submission.
    ///
    /// The caller must acknowledge the produced doubts at the required level
    /// and re-submit.
    #[error("submission blocked: {required:?} acknowledgement required")]
    VerificationBlocked {
        /// The acknowledgement level the doubt list requires.
        required: Acknowledgement,
    },
    /// The request targets no chains.
    #[error("operation request targets no chains")]
    EmptyTargetSet,
    /// The request targets the same chain more than once.
    #[error("duplicate target chain {0}")]
    DuplicateTargetChain(ChainId),
    /// The referenced bundle is unknown to the coordinator.
    #[error("unknown bundle {0}")]
    UnknownBundle(BundleId),
    /// The relay reported a chain outside the request's target set.
    ///
    /// This is an invariant violation, not a soft error: it is logged and
    /// surfaced as a bundle-level failure, never silently dropped.
    #[error("relay reported unknown chain {chain_id} for bundle {bundle}")]
    RelayInconsistency {
        /// The affected bundle.
        bundle: BundleId,
        /// The chain id outside the target set.
        chain_id: ChainId,
    },
    /// A payment chain was selected that the relay did not offer.
    #[error("chain {0} is not a payment option")]
    InvalidPaymentChain(ChainId),
    /// The bundle is not awaiting a payment chain selection.
    #[error("bundle {0} is not awaiting payment")]
    NotAwaitingPayment(BundleId),
    /// The coordinator service is no longer running.
    #[error("coordinator service unavailable")]
    ServiceUnavailable,
}
