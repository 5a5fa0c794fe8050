//! Single-chain execution.
//!
//! Drives one chain's share of an operation through
//! `pending → signing → submitted → confirmed | failed`. Entered once per
//! chain per operation. Payment operations carrying a secondary fee call try
//! one batched submission when the signing backend's capability probe allows
//! it; otherwise the calls go out sequentially in fixed order, primary first,
//! and a primary failure aborts the fee call.

use crate::{
    allowance::ensure_authorization,
    builder::{CallContext, build_calls},
    constants::{CONFIRMATION_TIMEOUT, RECEIPT_POLL_INTERVAL},
    config::OrchestratorConfig,
    error::{ExecutorError, truncate_for_display},
    resolver::{Providers, TerminalResolver},
    signers::{OperationSigner, SignerKind},
    types::{BundleId, OperationRequest, PreparedCall},
};
use alloy::{
    primitives::{ChainId, TxHash},
    providers::{DynProvider, Provider},
};
use std::sync::Arc;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, instrument, warn};

/// Progress update for one chain, emitted by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainUpdate {
    /// A signing action is being waited on.
    Signing,
    /// The primary transaction was broadcast.
    Submitted(TxHash),
    /// The primary transaction confirmed.
    Confirmed(TxHash),
    /// The chain's operation failed. Message is truncated for display.
    Failed(String),
    /// The user abandoned the flow on this chain.
    Cancelled,
}

/// An executor event, keyed so the coordinator can route it.
#[derive(Debug, Clone)]
pub struct ExecutorEvent {
    /// The bundle the chain belongs to.
    pub bundle: BundleId,
    /// The chain the update refers to.
    pub chain_id: ChainId,
    /// The update.
    pub update: ChainUpdate,
}

/// Executes one chain at a time on behalf of the coordinator.
#[derive(Debug)]
pub struct ChainExecutor {
    signer: Arc<dyn OperationSigner>,
    providers: Providers,
    config: Arc<OrchestratorConfig>,
    events_tx: mpsc::UnboundedSender<ExecutorEvent>,
}

impl ChainExecutor {
    /// Creates an executor bound to the coordinator's event channel.
    pub fn new(
        signer: Arc<dyn OperationSigner>,
        providers: Providers,
        config: Arc<OrchestratorConfig>,
        events_tx: mpsc::UnboundedSender<ExecutorEvent>,
    ) -> Self {
        Self { signer, providers, config, events_tx }
    }

    fn emit(&self, bundle: BundleId, chain_id: ChainId, update: ChainUpdate) {
        let _ = self.events_tx.send(ExecutorEvent { bundle, chain_id, update });
    }

    /// Runs one chain's share of the operation to a terminal state.
    ///
    /// Always emits a terminal update; errors never escape to the caller so
    /// that one chain's failure cannot halt its siblings.
    #[instrument(skip_all, fields(bundle = %bundle, chain_id = chain_id))]
    pub async fn run_chain(
        &self,
        bundle: BundleId,
        request: &OperationRequest,
        chain_id: ChainId,
        resolver: &TerminalResolver,
    ) {
        match self.drive(bundle, request, chain_id, resolver).await {
            Ok(hash) => self.emit(bundle, chain_id, ChainUpdate::Confirmed(hash)),
            Err(err) if err.is_cancellation() => {
                debug!(chain_id, "chain flow cancelled by user");
                self.emit(bundle, chain_id, ChainUpdate::Cancelled);
            }
            Err(err) => {
                warn!(chain_id, %err, "chain execution failed");
                self.emit(
                    bundle,
                    chain_id,
                    ChainUpdate::Failed(truncate_for_display(err.to_string())),
                );
            }
        }
    }

    async fn drive(
        &self,
        bundle: BundleId,
        request: &OperationRequest,
        chain_id: ChainId,
        resolver: &TerminalResolver,
    ) -> Result<TxHash, ExecutorError> {
        let provider = self
            .providers
            .get(&chain_id)
            .ok_or(ExecutorError::UnsupportedChain(chain_id))?
            .clone();

        let project_id = request.project_id_on(chain_id).unwrap_or(0);
        let target = resolver.target_for(&request.params, chain_id, project_id).await?;

        self.emit(bundle, chain_id, ChainUpdate::Signing);

        // Directly-connected wallets sign on their active chain only; managed
        // backends have no chain-switch concept.
        if self.signer.kind() == SignerKind::Wallet
            && self.signer.active_chain().await != Some(chain_id)
        {
            self.signer.switch_chain(chain_id).await?;
        }

        let allowance = match request.params.erc20_spend() {
            Some((token, amount)) => {
                ensure_authorization(
                    self.signer.as_ref(),
                    &provider,
                    &self.config.rpc,
                    chain_id,
                    token,
                    amount,
                    target,
                )
                .await?
            }
            None => None,
        };

        let ctx = CallContext {
            target,
            project_id,
            memo: request.memo.clone().unwrap_or_default(),
            activation: request.activation,
        };
        let calls = build_calls(&request.params, &ctx, allowance)?;

        let primary = self.submit(chain_id, &calls).await?;
        self.emit(bundle, chain_id, ChainUpdate::Submitted(primary));

        self.confirm(&provider, primary).await
    }

    /// Broadcasts the chain's calls, returning the primary transaction hash.
    async fn submit(
        &self,
        chain_id: ChainId,
        calls: &[PreparedCall],
    ) -> Result<TxHash, ExecutorError> {
        if calls.len() > 1 && self.signer.supports_batching() {
            // One wallet confirmation covers both calls.
            return Ok(self.signer.send_calls(chain_id, calls).await?);
        }

        let mut primary = None;
        for call in calls {
            // A primary failure aborts the remaining calls; confirmation of
            // the primary is not required before the fee call goes out.
            let hash = self.signer.send_call(chain_id, call).await?;
            primary.get_or_insert(hash);
        }
        primary.ok_or_else(|| ExecutorError::SubmissionFailed("no calls to submit".into()))
    }

    /// Polls for the receipt of the primary transaction.
    async fn confirm(
        &self,
        provider: &DynProvider,
        hash: TxHash,
    ) -> Result<TxHash, ExecutorError> {
        let deadline = tokio::time::Instant::now() + CONFIRMATION_TIMEOUT;
        loop {
            match provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status() {
                        return Ok(hash);
                    }
                    return Err(ExecutorError::SubmissionFailed(format!(
                        "transaction {hash} reverted"
                    )));
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(%err, "receipt poll failed, retrying");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ExecutorError::Dropped(hash));
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, RelayConfig, RpcConfig};
    use crate::constants::NATIVE_TOKEN;
    use crate::error::SignerError;
    use crate::types::{BundlingPreference, OperationParams, PayParams};
    use alloy::{
        consensus::{Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom},
        primitives::{Address, B256, Bytes, U256, address},
        providers::{ProviderBuilder, mock::Asserter},
        rpc::types::TransactionReceipt,
        sol_types::SolValue,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    const TERMINAL: Address = address!("0x00000000000000000000000000000000000000b2");

    #[derive(Debug, Default)]
    struct MockSigner {
        batching: bool,
        reject_sends: bool,
        single_sends: Mutex<usize>,
        batch_sends: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl OperationSigner for MockSigner {
        fn address(&self) -> Address {
            address!("0x00000000000000000000000000000000000000ee")
        }

        fn kind(&self) -> SignerKind {
            SignerKind::Managed
        }

        fn supports_batching(&self) -> bool {
            self.batching
        }

        async fn active_chain(&self) -> Option<ChainId> {
            None
        }

        async fn switch_chain(&self, _chain_id: ChainId) -> Result<(), SignerError> {
            Ok(())
        }

        async fn sign_payload_hash(
            &self,
            _chain_id: ChainId,
            _payload_hash: B256,
        ) -> Result<Bytes, SignerError> {
            Ok(Bytes::from_static(&[0x01; 65]))
        }

        async fn send_call(
            &self,
            _chain_id: ChainId,
            _call: &PreparedCall,
        ) -> Result<TxHash, SignerError> {
            if self.reject_sends {
                return Err(SignerError::Rejected);
            }
            *self.single_sends.lock().unwrap() += 1;
            Ok(B256::repeat_byte(0x11))
        }

        async fn send_calls(
            &self,
            _chain_id: ChainId,
            _calls: &[PreparedCall],
        ) -> Result<TxHash, SignerError> {
            *self.batch_sends.lock().unwrap() += 1;
            Ok(B256::repeat_byte(0x22))
        }
    }

    fn config() -> Arc<OrchestratorConfig> {
        let chain = ChainConfig {
            rpc_url: Url::parse("http://localhost:8545").unwrap(),
            directory: address!("0x00000000000000000000000000000000000000d1"),
            controller: address!("0x00000000000000000000000000000000000000d2"),
            swap_terminal: address!("0x00000000000000000000000000000000000000d3"),
            sucker_registry: address!("0x00000000000000000000000000000000000000d4"),
            revnet_deployer: address!("0x00000000000000000000000000000000000000d5"),
        };
        Arc::new(OrchestratorConfig {
            chains: [(1, chain)].into_iter().collect(),
            relay: RelayConfig::default(),
            rpc: RpcConfig::default(),
        })
    }

    fn receipt(hash: TxHash, success: bool) -> TransactionReceipt {
        TransactionReceipt {
            inner: ReceiptEnvelope::Eip1559(ReceiptWithBloom {
                receipt: Receipt {
                    status: Eip658Value::Eip658(success),
                    cumulative_gas_used: 21_000,
                    logs: vec![],
                },
                logs_bloom: Default::default(),
            }),
            transaction_hash: hash,
            transaction_index: Some(0),
            block_hash: Some(B256::repeat_byte(0xbb)),
            block_number: Some(1),
            gas_used: 21_000,
            effective_gas_price: 1,
            blob_gas_used: None,
            blob_gas_price: None,
            from: Address::ZERO,
            to: Some(TERMINAL),
            contract_address: None,
        }
    }

    fn pay_request(fee: bool) -> OperationRequest {
        OperationRequest {
            params: OperationParams::Pay(PayParams {
                token: NATIVE_TOKEN,
                amount: U256::from(100u64),
                beneficiary: address!("0x00000000000000000000000000000000000000a1"),
                min_returned_tokens: U256::from(1u64),
                fee: fee.then(|| crate::types::FeeCall {
                    project_id: 1,
                    amount: U256::from(3u64),
                    memo: String::new(),
                }),
            }),
            chains: vec![1],
            project_ids: [(1, 7u64)].into_iter().collect(),
            activation: None,
            memo: None,
            bundling: BundlingPreference::Declined,
        }
    }

    fn executor(
        signer: MockSigner,
        asserter: &Asserter,
    ) -> (ChainExecutor, mpsc::UnboundedReceiver<ExecutorEvent>, Providers) {
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
        let providers: Providers = Arc::new(HashMap::from([(1, provider)]));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let executor =
            ChainExecutor::new(Arc::new(signer), providers.clone(), config(), events_tx);
        (executor, events_rx, providers)
    }

    fn drain(events_rx: &mut mpsc::UnboundedReceiver<ExecutorEvent>) -> Vec<ChainUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            updates.push(event.update);
        }
        updates
    }

    #[tokio::test]
    async fn confirms_through_the_full_state_sequence() {
        let asserter = Asserter::new();
        // Directory read, then one empty receipt poll, then the receipt.
        asserter.push_success(&Bytes::from(TERMINAL.abi_encode()));
        asserter.push_success(&serde_json::Value::Null);
        asserter.push_success(&receipt(B256::repeat_byte(0x11), true));

        let (executor, mut events_rx, providers) = executor(MockSigner::default(), &asserter);
        let resolver = TerminalResolver::new(providers, config());
        let bundle = BundleId::random();

        executor.run_chain(bundle, &pay_request(false), 1, &resolver).await;

        let updates = drain(&mut events_rx);
        assert_eq!(
            updates,
            vec![
                ChainUpdate::Signing,
                ChainUpdate::Submitted(B256::repeat_byte(0x11)),
                ChainUpdate::Confirmed(B256::repeat_byte(0x11)),
            ]
        );
    }

    #[tokio::test]
    async fn batching_backend_gets_one_submission_for_paired_calls() {
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(TERMINAL.abi_encode()));
        asserter.push_success(&receipt(B256::repeat_byte(0x22), true));

        let signer = Arc::new(MockSigner { batching: true, ..Default::default() });
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
        let providers: Providers = Arc::new(HashMap::from([(1, provider)]));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let executor =
            ChainExecutor::new(signer.clone(), providers.clone(), config(), events_tx);
        let resolver = TerminalResolver::new(providers, config());

        executor.run_chain(BundleId::random(), &pay_request(true), 1, &resolver).await;

        let updates = drain(&mut events_rx);
        assert!(updates.contains(&ChainUpdate::Submitted(B256::repeat_byte(0x22))));
        assert!(updates.contains(&ChainUpdate::Confirmed(B256::repeat_byte(0x22))));
        assert_eq!(*signer.batch_sends.lock().unwrap(), 1);
        assert_eq!(*signer.single_sends.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn non_batching_backend_submits_sequentially() {
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(TERMINAL.abi_encode()));
        asserter.push_success(&receipt(B256::repeat_byte(0x11), true));

        let signer = Arc::new(MockSigner::default());
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased();
        let providers: Providers = Arc::new(HashMap::from([(1, provider)]));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let executor =
            ChainExecutor::new(signer.clone(), providers.clone(), config(), events_tx);
        let resolver = TerminalResolver::new(providers, config());

        executor.run_chain(BundleId::random(), &pay_request(true), 1, &resolver).await;

        let updates = drain(&mut events_rx);
        // Primary hash is reported even though two transactions went out.
        assert!(updates.contains(&ChainUpdate::Submitted(B256::repeat_byte(0x11))));
        assert_eq!(*signer.single_sends.lock().unwrap(), 2);
        assert_eq!(*signer.batch_sends.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn rejection_surfaces_as_cancelled() {
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(TERMINAL.abi_encode()));

        let signer = MockSigner { reject_sends: true, ..Default::default() };
        let (executor, mut events_rx, providers) = executor(signer, &asserter);
        let resolver = TerminalResolver::new(providers, config());

        executor.run_chain(BundleId::random(), &pay_request(false), 1, &resolver).await;

        let updates = drain(&mut events_rx);
        assert_eq!(updates.last(), Some(&ChainUpdate::Cancelled));
        assert!(!updates.iter().any(|u| matches!(u, ChainUpdate::Failed(_))));
    }

    #[tokio::test]
    async fn reverted_receipt_fails_the_chain() {
        let asserter = Asserter::new();
        asserter.push_success(&Bytes::from(TERMINAL.abi_encode()));
        asserter.push_success(&receipt(B256::repeat_byte(0x11), false));

        let (executor, mut events_rx, providers) = executor(MockSigner::default(), &asserter);
        let resolver = TerminalResolver::new(providers, config());

        executor.run_chain(BundleId::random(), &pay_request(false), 1, &resolver).await;

        let updates = drain(&mut events_rx);
        assert!(matches!(updates.last(), Some(ChainUpdate::Failed(msg)) if msg.contains("reverted")));
    }
}
