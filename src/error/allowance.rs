use super::SignerError;
use alloy::primitives::Address;
use thiserror::Error;

/// Errors returned by the allowance/permit signer.
#[derive(Debug, Error)]
pub enum AllowanceError {
    /// Signing the off-chain authorization failed.
    ///
    /// Recoverable: the caller falls back to a direct on-chain approval of the
    /// destination spender.
    #[error("allowance signing failed: {0}")]
    SigningFailed(#[source] SignerError),
    /// The approval transaction failed.
    ///
    /// Fatal for the affected chain's operation.
    #[error("approval of {spender} failed: {reason}")]
    ApprovalFailed {
        /// The spender that was being approved.
        spender: Address,
        /// Underlying failure, truncated for display.
        reason: String,
    },
    /// The allowance read timed out after all retries.
    #[error("allowance read timed out")]
    Timeout,
    /// An error occurred talking to the token or registry contract.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
    /// Signer error outside of the signing step itself.
    #[error(transparent)]
    Signer(#[from] SignerError),
}
