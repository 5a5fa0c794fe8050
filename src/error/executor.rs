use super::{AllowanceError, CallBuilderError, ResolverError, SignerError};
use alloy::primitives::ChainId;
use thiserror::Error;

/// Errors returned by the single-chain executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The user abandoned the flow.
    ///
    /// Surfaced as a neutral state, never as a failure with a retry prompt.
    #[error("cancelled by user")]
    Cancelled,
    /// Submitting the transaction failed.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
    /// The submitted transaction was never confirmed.
    #[error("transaction {0} was dropped")]
    Dropped(alloy::primitives::TxHash),
    /// The chain has no configured provider.
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
    /// Terminal resolution failed for this chain.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// Spending authorization failed for this chain.
    #[error(transparent)]
    Allowance(#[from] AllowanceError),
    /// Call construction failed.
    #[error(transparent)]
    Build(#[from] CallBuilderError),
    /// Signing backend error.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl ExecutorError {
    /// Whether this error represents a user-abandoned flow.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Signer(err) => err.is_rejection(),
            Self::Allowance(AllowanceError::Signer(err)) => err.is_rejection(),
            _ => false,
        }
    }
}
