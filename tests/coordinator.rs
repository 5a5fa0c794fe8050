//! Coordinator end-to-end scenarios against an in-memory relay and signing
//! backend.

use alloy::{
    primitives::{Address, B256, Bytes, ChainId, TxHash, U256, address},
    providers::{Provider, ProviderBuilder, mock::Asserter},
    sol_types::SolValue,
};
use eyre::Result;
use omnibundle::{
    config::{ChainConfig, OrchestratorConfig, RelayConfig, RpcConfig},
    constants::NATIVE_TOKEN,
    coordinator::{CoordinatorContext, CoordinatorHandle, CoordinatorService},
    error::{CoordinatorError, RelayClientError, SignerError},
    relay::RelayApi,
    resolver::Providers,
    signers::{OperationSigner, SignerKind},
    types::{
        Acknowledgement, BundleStatus, BundlingPreference, ChainStatus, LaunchProjectParams,
        OperationParams, OperationRequest, PayParams, PaymentOption, PreparedCall,
        contracts::RulesetConfig,
        relay::{RelayBundle, RelayBundleRequest, RelayBundleStatus, RelayChainStatus, RelayChainStatusCode},
    },
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::timeout;

const OWNER: Address = address!("0x00000000000000000000000000000000000000ee");
const BENEFICIARY: Address = address!("0x00000000000000000000000000000000000000a1");

fn chain_config() -> ChainConfig {
    ChainConfig {
        rpc_url: url::Url::parse("http://localhost:8545").unwrap(),
        directory: address!("0x00000000000000000000000000000000000000d1"),
        controller: address!("0x00000000000000000000000000000000000000d2"),
        swap_terminal: address!("0x00000000000000000000000000000000000000d3"),
        sucker_registry: address!("0x00000000000000000000000000000000000000d4"),
        revnet_deployer: address!("0x00000000000000000000000000000000000000d5"),
    }
}

fn config(chains: &[ChainId]) -> Arc<OrchestratorConfig> {
    Arc::new(OrchestratorConfig {
        chains: chains.iter().map(|chain_id| (*chain_id, chain_config())).collect(),
        relay: RelayConfig {
            poll_interval: Duration::from_millis(20),
            ..RelayConfig::default()
        },
        rpc: RpcConfig::default(),
    })
}

/// One mocked provider per chain, with a queue of responses each.
fn providers(asserters: &HashMap<ChainId, Asserter>) -> Providers {
    Arc::new(
        asserters
            .iter()
            .map(|(chain_id, asserter)| {
                (*chain_id, ProviderBuilder::new().connect_mocked_client(asserter.clone()).erased())
            })
            .collect(),
    )
}

/// Signing backend that records submissions and can fail selected chains.
#[derive(Debug, Default)]
struct MockSigner {
    reject_on: Vec<ChainId>,
    sends: Mutex<Vec<(ChainId, PreparedCall)>>,
}

impl MockSigner {
    fn tx_hash(chain_id: ChainId) -> TxHash {
        B256::repeat_byte(chain_id as u8)
    }
}

#[async_trait::async_trait]
impl OperationSigner for MockSigner {
    fn address(&self) -> Address {
        OWNER
    }

    fn kind(&self) -> SignerKind {
        SignerKind::Managed
    }

    fn supports_batching(&self) -> bool {
        false
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
        chain_id: ChainId,
        call: &PreparedCall,
    ) -> Result<TxHash, SignerError> {
        if self.reject_on.contains(&chain_id) {
            return Err(SignerError::Rejected);
        }
        self.sends.lock().unwrap().push((chain_id, call.clone()));
        Ok(Self::tx_hash(chain_id))
    }

    async fn send_calls(
        &self,
        _chain_id: ChainId,
        _calls: &[PreparedCall],
    ) -> Result<TxHash, SignerError> {
        Err(SignerError::Unsupported("batched submission"))
    }
}

/// In-memory relay with a scripted sequence of status responses.
#[derive(Debug, Default)]
struct MockRelay {
    payment_options: Vec<PaymentOption>,
    sponsored: bool,
    statuses: Mutex<VecDeque<Vec<RelayChainStatus>>>,
    last_status: Mutex<Vec<RelayChainStatus>>,
    created_with: Mutex<Option<RelayBundleRequest>>,
    started_with: Mutex<Option<ChainId>>,
}

#[async_trait::async_trait]
impl RelayApi for MockRelay {
    async fn create_bundle(
        &self,
        request: &RelayBundleRequest,
    ) -> Result<RelayBundle, RelayClientError> {
        *self.created_with.lock().unwrap() = Some(request.clone());
        Ok(RelayBundle {
            bundle_uuid: "bundle-1".to_string(),
            payment_options: self.payment_options.clone(),
            sponsored: self.sponsored,
        })
    }

    async fn start_bundle(
        &self,
        _bundle_uuid: &str,
        payment_chain: ChainId,
    ) -> Result<(), RelayClientError> {
        *self.started_with.lock().unwrap() = Some(payment_chain);
        Ok(())
    }

    async fn bundle_status(&self, bundle_uuid: &str) -> Result<RelayBundleStatus, RelayClientError> {
        let chains = {
            let mut queue = self.statuses.lock().unwrap();
            match queue.pop_front() {
                Some(chains) => {
                    *self.last_status.lock().unwrap() = chains.clone();
                    chains
                }
                None => self.last_status.lock().unwrap().clone(),
            }
        };
        Ok(RelayBundleStatus { bundle_uuid: bundle_uuid.to_string(), chains })
    }
}

fn status(
    chain_id: ChainId,
    code: RelayChainStatusCode,
    tx_hash: Option<TxHash>,
    project_id: Option<u64>,
) -> RelayChainStatus {
    RelayChainStatus {
        chain_id,
        status: code,
        tx_hash,
        project_id,
        error: (code == RelayChainStatusCode::Failed).then(|| "execution reverted".to_string()),
    }
}

fn spawn_coordinator(
    chains: &[ChainId],
    asserters: &HashMap<ChainId, Asserter>,
    signer: Arc<MockSigner>,
    relay: Arc<MockRelay>,
) -> CoordinatorHandle {
    let ctx = CoordinatorContext {
        config: config(chains),
        providers: providers(asserters),
        signer,
        relay,
    };
    CoordinatorService::spawn(ctx)
}

fn launch_request(chains: Vec<ChainId>) -> OperationRequest {
    OperationRequest {
        params: OperationParams::LaunchProject(LaunchProjectParams {
            owner: OWNER,
            metadata: Default::default(),
            configs: vec![RulesetConfig::default()],
            terminals: vec![],
        }),
        chains,
        project_ids: HashMap::new(),
        activation: None,
        memo: Some("multi-chain launch".to_string()),
        bundling: BundlingPreference::Preferred,
    }
}

fn pay_request(chains: Vec<ChainId>, bundling: BundlingPreference) -> OperationRequest {
    let project_ids = chains.iter().map(|chain_id| (*chain_id, 7u64)).collect();
    OperationRequest {
        params: OperationParams::Pay(PayParams {
            token: NATIVE_TOKEN,
            amount: U256::from(100u64),
            beneficiary: BENEFICIARY,
            min_returned_tokens: U256::from(1u64),
            fee: None,
        }),
        chains,
        project_ids,
        activation: None,
        memo: None,
        bundling,
    }
}

/// Asserter queue for a chain that only serves the submit-time balance read.
fn balance_only(balance: u64) -> Asserter {
    let asserter = Asserter::new();
    asserter.push_success(&U256::from(balance));
    asserter
}

const TERMINAL: Address = address!("0x00000000000000000000000000000000000000b2");

#[tokio::test(flavor = "multi_thread")]
async fn bundled_launch_partial_failure_keeps_confirmed_hashes() -> Result<()> {
    let chains = vec![1, 10, 8453];
    let asserters: HashMap<ChainId, Asserter> =
        chains.iter().map(|chain_id| (*chain_id, balance_only(1_000))).collect();

    let relay = Arc::new(MockRelay {
        payment_options: vec![
            PaymentOption { chain_id: 1, amount: U256::from(500u64) },
            PaymentOption { chain_id: 10, amount: U256::from(400u64) },
        ],
        ..Default::default()
    });
    let hash = |chain_id: ChainId| Some(B256::repeat_byte(chain_id as u8));
    relay.statuses.lock().unwrap().extend([
        vec![
            status(1, RelayChainStatusCode::Submitted, hash(1), None),
            status(10, RelayChainStatusCode::Submitted, hash(10), None),
            status(8453, RelayChainStatusCode::Submitted, hash(8453), None),
        ],
        vec![
            status(1, RelayChainStatusCode::Confirmed, hash(1), Some(42)),
            status(10, RelayChainStatusCode::Submitted, hash(10), None),
            status(8453, RelayChainStatusCode::Confirmed, hash(8453), Some(43)),
        ],
        vec![status(10, RelayChainStatusCode::Failed, None, None)],
    ]);

    let handle =
        spawn_coordinator(&chains, &asserters, Arc::new(MockSigner::default()), relay.clone());

    let subscription =
        handle.submit(launch_request(chains.clone()), Acknowledgement::None).await?;
    let mut states = subscription.states;

    // Payment options arrive; both are affordable, so no auto-selection.
    timeout(Duration::from_secs(5), states.wait_for(|s| s.status == BundleStatus::AwaitingPayment))
        .await??;
    handle.select_payment_chain(subscription.id, 10).await?;

    let final_state = timeout(
        Duration::from_secs(5),
        states.wait_for(|s| s.status.is_final()),
    )
    .await??
    .clone();

    assert_eq!(final_state.status, BundleStatus::Failed);
    assert_eq!(final_state.chains.len(), 3);
    assert_eq!(final_state.payment_chain, Some(10));
    assert_eq!(*relay.started_with.lock().unwrap(), Some(10));

    // Confirmed chains keep their hashes and resolved project ids; order
    // matches the request's chain order.
    let by_chain: HashMap<ChainId, _> =
        final_state.chains.iter().map(|c| (c.chain_id, c)).collect();
    assert_eq!(by_chain[&1].status, ChainStatus::Confirmed);
    assert_eq!(by_chain[&1].tx_hash, Some(B256::repeat_byte(1)));
    assert_eq!(by_chain[&1].project_id, Some(42));
    assert_eq!(by_chain[&8453].status, ChainStatus::Confirmed);
    assert_eq!(by_chain[&8453].tx_hash, Some(B256::repeat_byte(8453u64 as u8)));
    assert_eq!(by_chain[&8453].project_id, Some(43));
    assert_eq!(by_chain[&10].status, ChainStatus::Failed);
    assert!(by_chain[&10].error.as_deref().unwrap_or_default().contains("reverted"));

    // One transaction per chain went into the bundle.
    let created = relay.created_with.lock().unwrap().clone().unwrap();
    assert_eq!(created.transactions.len(), 3);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_bundle_discards_later_relay_updates() -> Result<()> {
    let chains = vec![1, 10];
    let asserters: HashMap<ChainId, Asserter> =
        [(1, balance_only(1_000)), (10, balance_only(1_000))].into_iter().collect();

    // Sponsored bundle: no payment selection step, execution starts at once.
    let relay = Arc::new(MockRelay { sponsored: true, ..Default::default() });
    relay.statuses.lock().unwrap().push_back(vec![status(
        1,
        RelayChainStatusCode::Submitted,
        Some(B256::repeat_byte(1)),
        None,
    )]);

    let handle =
        spawn_coordinator(&chains, &asserters, Arc::new(MockSigner::default()), relay.clone());

    let subscription =
        handle.submit(launch_request(chains.clone()), Acknowledgement::None).await?;
    let mut states = subscription.states;

    timeout(
        Duration::from_secs(5),
        states.wait_for(|s| {
            s.chain(1).is_some_and(|chain| chain.status == ChainStatus::Submitted)
        }),
    )
    .await??;

    handle.cancel(subscription.id).await?;

    // The relay keeps reporting progress (confirmations) after cancellation;
    // none of it may reach the bundle state.
    relay.statuses.lock().unwrap().push_back(vec![
        status(1, RelayChainStatusCode::Confirmed, Some(B256::repeat_byte(1)), None),
        status(10, RelayChainStatusCode::Confirmed, Some(B256::repeat_byte(10)), None),
    ]);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = handle.state(subscription.id).await?;
    assert_eq!(state.chain(1).unwrap().status, ChainStatus::Submitted);
    assert_ne!(state.status, BundleStatus::Completed);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn verification_gate_blocks_before_any_signing() -> Result<()> {
    let chains = vec![1];
    let asserters: HashMap<ChainId, Asserter> = [(1, balance_only(1_000))].into_iter().collect();
    let signer = Arc::new(MockSigner::default());
    let relay = Arc::new(MockRelay::default());

    let handle = spawn_coordinator(&chains, &asserters, signer.clone(), relay.clone());

    let mut request = pay_request(vec![1], BundlingPreference::Declined);
    if let OperationParams::Pay(params) = &mut request.params {
        params.beneficiary = Address::ZERO;
    }

    let err = handle.submit(request, Acknowledgement::None).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::VerificationBlocked { required: Acknowledgement::RiskAccepted }
    ));

    // Nothing was signed and nothing reached the relay.
    assert!(signer.sends.lock().unwrap().is_empty());
    assert!(relay.created_with.lock().unwrap().is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sequential_failure_does_not_halt_sibling_chains() -> Result<()> {
    let chains = vec![1, 10];

    // Chain 1: balance read, directory read (the signer then rejects).
    let chain1 = Asserter::new();
    chain1.push_success(&U256::from(1_000u64));
    chain1.push_success(&Bytes::from(TERMINAL.abi_encode()));

    // Chain 10: balance read, directory read, then the confirmation receipt.
    let chain10 = Asserter::new();
    chain10.push_success(&U256::from(1_000u64));
    chain10.push_success(&Bytes::from(TERMINAL.abi_encode()));
    chain10.push_success(&receipt(MockSigner::tx_hash(10)));

    let asserters: HashMap<ChainId, Asserter> =
        [(1, chain1), (10, chain10)].into_iter().collect();

    let signer = Arc::new(MockSigner { reject_on: vec![1], ..Default::default() });
    let relay = Arc::new(MockRelay::default());
    let handle = spawn_coordinator(&chains, &asserters, signer.clone(), relay.clone());

    let subscription = handle
        .submit(pay_request(chains.clone(), BundlingPreference::Declined), Acknowledgement::None)
        .await?;
    let mut states = subscription.states;

    let final_state =
        timeout(Duration::from_secs(5), states.wait_for(|s| s.status.is_final())).await??.clone();

    // The user abandoned chain 1; chain 10 still ran to confirmation.
    assert_eq!(final_state.chain(1).unwrap().status, ChainStatus::Cancelled);
    assert_eq!(final_state.chain(10).unwrap().status, ChainStatus::Confirmed);
    assert_eq!(final_state.chain(10).unwrap().tx_hash, Some(MockSigner::tx_hash(10)));
    assert_eq!(final_state.status, BundleStatus::Failed);

    // Bundling was declined: the relay never saw the request.
    assert!(relay.created_with.lock().unwrap().is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_returns_a_settled_bundle_to_idle() -> Result<()> {
    let chains = vec![1];
    let chain1 = Asserter::new();
    chain1.push_success(&U256::from(1_000u64));
    chain1.push_success(&Bytes::from(TERMINAL.abi_encode()));
    chain1.push_success(&receipt(MockSigner::tx_hash(1)));
    let asserters: HashMap<ChainId, Asserter> = [(1, chain1)].into_iter().collect();

    let handle = spawn_coordinator(
        &chains,
        &asserters,
        Arc::new(MockSigner::default()),
        Arc::new(MockRelay::default()),
    );

    let subscription = handle
        .submit(pay_request(chains.clone(), BundlingPreference::Declined), Acknowledgement::None)
        .await?;
    let mut states = subscription.states;
    timeout(Duration::from_secs(5), states.wait_for(|s| s.status == BundleStatus::Completed))
        .await??;

    handle.reset(subscription.id).await?;
    let state = handle.state(subscription.id).await?;
    assert_eq!(state.status, BundleStatus::Idle);
    assert!(state.chains.iter().all(|chain| chain.status == ChainStatus::Pending));
    assert!(state.chains.iter().all(|chain| chain.tx_hash.is_none()));

    Ok(())
}

fn receipt(hash: TxHash) -> alloy::rpc::types::TransactionReceipt {
    use alloy::consensus::{Eip658Value, Receipt, ReceiptEnvelope, ReceiptWithBloom};
    alloy::rpc::types::TransactionReceipt {
        inner: ReceiptEnvelope::Eip1559(ReceiptWithBloom {
            receipt: Receipt {
                status: Eip658Value::Eip658(true),
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
        from: OWNER,
        to: Some(TERMINAL),
        contract_address: None,
    }
}
