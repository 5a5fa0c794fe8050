use alloy::primitives::{Address, ChainId};
use thiserror::Error;

/// Errors returned by the terminal/controller resolver.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// No terminal accepts the given token on the given chain, and no
    /// swap-capable fallback is configured.
    ///
    /// Fatal for the affected chain only; sibling chains in the same bundle
    /// are unaffected.
    #[error("no terminal for token {token} on chain {chain_id} (project {project_id})")]
    TerminalNotFound {
        /// Chain the lookup ran on.
        chain_id: ChainId,
        /// Project the lookup ran for.
        project_id: u64,
        /// The payment token.
        token: Address,
    },
    /// The chain is not configured.
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
    /// The directory read timed out after all retries.
    #[error("directory read timed out on chain {0}")]
    Timeout(ChainId),
    /// An error occurred talking to the directory contract.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
}
