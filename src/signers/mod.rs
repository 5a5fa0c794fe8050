//! Signing backends.
//!
//! Two backends drive transactions: a directly-connected wallet (the user's
//! own signer, which must be switched to the target chain before signing) and
//! a managed, custodial signer (a server executes on behalf of the user; no
//! chain-switch concept). The executor probes capabilities up front instead of
//! catching late failures.

use crate::{error::SignerError, types::PreparedCall};
use alloy::primitives::{Address, B256, Bytes, ChainId, TxHash};
use std::fmt;

mod wallet;
pub use wallet::WalletSigner;

mod managed;
pub use managed::{ManagedSigner, ManagedSignerConfig};

/// The kind of a signing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// A directly-connected wallet.
    Wallet,
    /// A managed (custodial) signer.
    Managed,
}

/// A signing backend capable of driving one chain's transactions.
#[async_trait::async_trait]
pub trait OperationSigner: fmt::Debug + Send + Sync {
    /// The account the backend signs for.
    fn address(&self) -> Address;

    /// The kind of the backend.
    fn kind(&self) -> SignerKind;

    /// Whether the backend can submit several calls in one confirmation.
    ///
    /// Capability probe for the executor's batched path; backends answering
    /// `false` are never handed more than one call at a time.
    fn supports_batching(&self) -> bool;

    /// The chain the backend is currently pointed at, if it has the concept.
    async fn active_chain(&self) -> Option<ChainId>;

    /// Points the backend at the given chain.
    ///
    /// A no-op for backends without an active-chain concept.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), SignerError>;

    /// Signs a 32-byte payload hash (EIP-712 digest).
    async fn sign_payload_hash(
        &self,
        chain_id: ChainId,
        payload_hash: B256,
    ) -> Result<Bytes, SignerError>;

    /// Signs and broadcasts a single call, returning its transaction hash.
    async fn send_call(
        &self,
        chain_id: ChainId,
        call: &PreparedCall,
    ) -> Result<TxHash, SignerError>;

    /// Signs and broadcasts several calls as one submission.
    ///
    /// Only invoked when [`Self::supports_batching`] returned `true`.
    async fn send_calls(
        &self,
        chain_id: ChainId,
        calls: &[PreparedCall],
    ) -> Result<TxHash, SignerError>;
}
