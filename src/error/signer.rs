use alloy::primitives::ChainId;
use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

/// Errors returned by signing backends.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The user rejected the signing request in their wallet.
    #[error("user rejected the request")]
    Rejected,
    /// The backend does not support the requested capability.
    #[error("signing backend does not support {0}")]
    Unsupported(&'static str),
    /// The backend has no connection for the given chain.
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
    /// Error occurred while signing.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),
    /// RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// The managed backend returned an error.
    #[error("managed signer error: {0}")]
    Managed(String),
    /// HTTP transport error talking to the managed backend.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Other errors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl SignerError {
    /// Whether this error represents a user-abandoned flow rather than a
    /// genuine failure.
    ///
    /// Wallet software reports rejection in free text, so classification falls
    /// back to message-pattern matching for errors that are not already
    /// [`SignerError::Rejected`].
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Rejected => true,
            other => is_rejection_message(&other.to_string()),
        }
    }
}

/// Returns whether an error message matches a known rejection/denial pattern.
pub fn is_rejection_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    ["user rejected", "user denied", "rejected by user", "user cancelled", "request rejected"]
        .iter()
        .any(|pat| msg.contains(pat))
}
