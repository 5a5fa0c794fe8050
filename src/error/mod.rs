//! Orchestrator error types.

use crate::constants::DISPLAY_ERROR_MAX_LEN;
use thiserror::Error;

mod build;
pub use build::CallBuilderError;

mod resolver;
pub use resolver::ResolverError;

mod allowance;
pub use allowance::AllowanceError;

mod signer;
pub use signer::SignerError;

mod executor;
pub use executor::ExecutorError;

mod relay;
pub use relay::RelayClientError;

mod coordinator;
pub use coordinator::CoordinatorError;

/// The overarching error type returned by the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Errors related to building call data.
    #[error(transparent)]
    Build(#[from] CallBuilderError),
    /// Errors related to terminal/controller resolution.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// Errors related to spending authorization.
    #[error(transparent)]
    Allowance(#[from] AllowanceError),
    /// Errors related to signing backends.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// Errors related to single-chain execution.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// Errors related to the bundling relay.
    #[error(transparent)]
    Relay(#[from] RelayClientError),
    /// Errors related to bundle coordination.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    /// An error occurred during ABI encoding/decoding.
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

/// Truncates a raw underlying error message for display.
///
/// Provider errors can embed entire revert payloads; callers only ever see the
/// head of the message.
pub fn truncate_for_display(msg: impl AsRef<str>) -> String {
    let msg = msg.as_ref();
    if msg.len() <= DISPLAY_ERROR_MAX_LEN {
        return msg.to_string();
    }
    let mut cut = DISPLAY_ERROR_MAX_LEN;
    while !msg.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &msg[..cut])
}
