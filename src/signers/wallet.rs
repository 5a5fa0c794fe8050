//! Directly-connected wallet backend.

use super::{OperationSigner, SignerKind};
use crate::{error::SignerError, resolver::Providers, types::PreparedCall};
use alloy::{
    consensus::TxEip1559,
    eips::Encodable2718,
    network::{Ethereum, EthereumWallet, FullSigner, NetworkWallet, TransactionBuilder, TxSigner},
    primitives::{Address, B256, Bytes, ChainId, Signature, TxHash},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::Mutex;

/// A wallet backend over a local signer.
///
/// Mirrors the contract of injected wallet software: signing is only allowed
/// on the active chain, so callers must [`switch_chain`](OperationSigner::switch_chain)
/// first when the target differs.
pub struct WalletSigner {
    signer: Arc<dyn FullSigner<Signature> + Send + Sync>,
    wallet: EthereumWallet,
    providers: Providers,
    active_chain: Mutex<Option<ChainId>>,
    batching: bool,
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner").field("address", &self.address()).finish()
    }
}

impl WalletSigner {
    /// Creates a wallet backend from an existing signer.
    ///
    /// `batching` reflects the wallet's capability entry; local raw-key
    /// signers cannot batch.
    pub fn new(
        signer: Arc<dyn FullSigner<Signature> + Send + Sync>,
        providers: Providers,
        batching: bool,
    ) -> Self {
        let wallet = EthereumWallet::new(signer.clone());
        Self { signer, wallet, providers, active_chain: Mutex::new(None), batching }
    }

    /// Loads a wallet backend from a raw private key.
    pub fn from_signing_key(key: &str, providers: Providers) -> eyre::Result<Self> {
        let signer = PrivateKeySigner::from_str(key)?;
        Ok(Self::new(Arc::new(signer), providers, false))
    }

    fn provider(&self, chain_id: ChainId) -> Result<&DynProvider, SignerError> {
        self.providers.get(&chain_id).ok_or(SignerError::UnsupportedChain(chain_id))
    }

    async fn require_active(&self, chain_id: ChainId) -> Result<(), SignerError> {
        if *self.active_chain.lock().await != Some(chain_id) {
            return Err(SignerError::Unsupported("signing on a chain that is not active"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl OperationSigner for WalletSigner {
    fn address(&self) -> Address {
        TxSigner::address(&self.signer)
    }

    fn kind(&self) -> SignerKind {
        SignerKind::Wallet
    }

    fn supports_batching(&self) -> bool {
        self.batching
    }

    async fn active_chain(&self) -> Option<ChainId> {
        *self.active_chain.lock().await
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), SignerError> {
        if !self.providers.contains_key(&chain_id) {
            return Err(SignerError::UnsupportedChain(chain_id));
        }
        *self.active_chain.lock().await = Some(chain_id);
        Ok(())
    }

    async fn sign_payload_hash(
        &self,
        chain_id: ChainId,
        payload_hash: B256,
    ) -> Result<Bytes, SignerError> {
        self.require_active(chain_id).await?;
        Ok(self.signer.sign_hash(&payload_hash).await?.as_bytes().into())
    }

    async fn send_call(
        &self,
        chain_id: ChainId,
        call: &PreparedCall,
    ) -> Result<TxHash, SignerError> {
        self.require_active(chain_id).await?;
        let provider = self.provider(chain_id)?;

        let request = TransactionRequest::default()
            .with_from(self.address())
            .with_to(call.target)
            .with_value(call.value)
            .with_input(call.data.clone());
        let (nonce, fees, gas_limit) = tokio::try_join!(
            provider.get_transaction_count(self.address()).pending(),
            provider.estimate_eip1559_fees(),
            provider.estimate_gas(request),
        )?;

        let tx = TxEip1559 {
            chain_id,
            nonce,
            to: call.target.into(),
            value: call.value,
            input: call.data.clone(),
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            access_list: Default::default(),
        };

        let signed =
            NetworkWallet::<Ethereum>::sign_transaction_from(&self.wallet, self.address(), tx.into())
                .await?;
        let _ = provider.send_raw_transaction(&signed.encoded_2718()).await?;
        Ok(*signed.tx_hash())
    }

    async fn send_calls(
        &self,
        _chain_id: ChainId,
        _calls: &[PreparedCall],
    ) -> Result<TxHash, SignerError> {
        // The capability probe keeps the executor off this path for raw-key
        // wallets.
        Err(SignerError::Unsupported("batched submission"))
    }
}
