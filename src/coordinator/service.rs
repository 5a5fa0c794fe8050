//! Coordinator service and handle.

use super::bundled::{BundledRun, RelayEvent};
use super::{CoordinatorContext, gather_verification_context};
use crate::{
    error::CoordinatorError,
    executor::{ChainExecutor, ChainUpdate, ExecutorEvent},
    metrics::CoordinatorMetrics,
    payment::{default_selection, rank_options},
    resolver::TerminalResolver,
    types::{
        Acknowledgement, BundleId, BundleState, BundleStatus, BundlingPreference, ChainStatus,
        OperationRequest, TransactionDoubt, relay::RelayChainStatus, relay::RelayChainStatusCode,
        required_acknowledgement,
    },
    verify,
};
use alloy::primitives::{ChainId, U256};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, instrument, warn};

/// How a bundle is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    /// Delegated to the external bundling relay.
    Bundled,
    /// Driven chain by chain, in input order.
    Sequential,
}

/// A live subscription to one bundle's state.
#[derive(Debug)]
pub struct BundleSubscription {
    /// The coordinator-assigned bundle id.
    pub id: BundleId,
    /// Receiver of state snapshots; updated on every transition.
    pub states: watch::Receiver<BundleState>,
}

/// Messages accepted by the [`CoordinatorService`].
#[derive(Debug)]
enum CoordinatorMessage {
    Submit {
        request: OperationRequest,
        native_balances: HashMap<ChainId, U256>,
        reply: oneshot::Sender<Result<BundleSubscription, CoordinatorError>>,
    },
    State {
        id: BundleId,
        reply: oneshot::Sender<Result<BundleState, CoordinatorError>>,
    },
    SelectPaymentChain {
        id: BundleId,
        chain_id: ChainId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    Cancel {
        id: BundleId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    Reset {
        id: BundleId,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
}

/// Handle to communicate with the [`CoordinatorService`].
///
/// The handle performs verification itself (it owns the context needed for
/// balance snapshots); everything stateful goes through the service's
/// single-task event loop.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::UnboundedSender<CoordinatorMessage>,
    ctx: CoordinatorContext,
}

impl CoordinatorHandle {
    /// Runs the verification engine over the request with a fresh balance
    /// snapshot.
    pub async fn verify(&self, request: &OperationRequest) -> Vec<TransactionDoubt> {
        let snapshot = gather_verification_context(&self.ctx, request).await;
        verify::verify(request, &snapshot)
    }

    /// Submits an operation for execution.
    ///
    /// Verification gates submission: an insufficient acknowledgement level
    /// fails before any signing step is reached.
    pub async fn submit(
        &self,
        request: OperationRequest,
        acknowledgement: Acknowledgement,
    ) -> Result<BundleSubscription, CoordinatorError> {
        if request.chains.is_empty() {
            return Err(CoordinatorError::EmptyTargetSet);
        }
        let mut seen = HashSet::new();
        for chain_id in &request.chains {
            if !seen.insert(*chain_id) {
                return Err(CoordinatorError::DuplicateTargetChain(*chain_id));
            }
        }

        let snapshot = gather_verification_context(&self.ctx, &request).await;
        let doubts = verify::verify(&request, &snapshot);
        let required = required_acknowledgement(&doubts);
        if acknowledgement < required {
            return Err(CoordinatorError::VerificationBlocked { required });
        }

        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(CoordinatorMessage::Submit {
                request,
                native_balances: snapshot.native_balances,
                reply,
            })
            .map_err(|_| CoordinatorError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| CoordinatorError::ServiceUnavailable)?
    }

    /// Returns the current state snapshot of a bundle.
    pub async fn state(&self, id: BundleId) -> Result<BundleState, CoordinatorError> {
        self.request(|reply| CoordinatorMessage::State { id, reply }).await
    }

    /// Selects the chain that pays the bundle's aggregate gas.
    pub async fn select_payment_chain(
        &self,
        id: BundleId,
        chain_id: ChainId,
    ) -> Result<(), CoordinatorError> {
        self.request(|reply| CoordinatorMessage::SelectPaymentChain { id, chain_id, reply }).await
    }

    /// Cancels a bundle: later updates for it are discarded. Transactions
    /// already broadcast resolve on-chain regardless.
    pub async fn cancel(&self, id: BundleId) -> Result<(), CoordinatorError> {
        self.request(|reply| CoordinatorMessage::Cancel { id, reply }).await
    }

    /// Resets a bundle back to idle, discarding any in-flight activity.
    pub async fn reset(&self, id: BundleId) -> Result<(), CoordinatorError> {
        self.request(|reply| CoordinatorMessage::Reset { id, reply }).await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<Result<T, CoordinatorError>>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(message(reply))
            .map_err(|_| CoordinatorError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| CoordinatorError::ServiceUnavailable)?
    }
}

/// One tracked bundle.
#[derive(Debug)]
struct BundleEntry {
    state: BundleState,
    watch_tx: watch::Sender<BundleState>,
    /// Set on cancel/reset/inconsistency; stale updates for the bundle are
    /// discarded from then on.
    cancelled: bool,
    mode: ExecutionMode,
    /// Fires the relay start once a payment chain is selected.
    start_tx: Option<oneshot::Sender<ChainId>>,
    /// Stops the bundle's background task.
    cancel_tx: watch::Sender<bool>,
    /// Native balances snapshotted at submission, for affordability ranking.
    native_balances: HashMap<ChainId, U256>,
    submitted_at: DateTime<Utc>,
}

impl BundleEntry {
    fn publish(&mut self) {
        self.watch_tx.send_replace(self.state.clone());
    }
}

/// The orchestration core.
///
/// Owns every [`BundleState`] exclusively; other components only ever see
/// snapshots. Runs as a single event loop over caller commands, executor
/// events and relay events.
#[derive(Debug)]
pub struct CoordinatorService {
    ctx: CoordinatorContext,
    executor: Arc<ChainExecutor>,
    command_rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
    executor_events_rx: mpsc::UnboundedReceiver<ExecutorEvent>,
    relay_events_tx: mpsc::UnboundedSender<RelayEvent>,
    relay_events_rx: mpsc::UnboundedReceiver<RelayEvent>,
    bundles: HashMap<BundleId, BundleEntry>,
    metrics: Arc<CoordinatorMetrics>,
}

impl CoordinatorService {
    /// Creates a new [`CoordinatorService`] and its handle.
    pub fn new(ctx: CoordinatorContext) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (executor_events_tx, executor_events_rx) = mpsc::unbounded_channel();
        let (relay_events_tx, relay_events_rx) = mpsc::unbounded_channel();

        let executor = Arc::new(ChainExecutor::new(
            ctx.signer.clone(),
            ctx.providers.clone(),
            ctx.config.clone(),
            executor_events_tx,
        ));

        let handle = CoordinatorHandle { command_tx, ctx: ctx.clone() };
        let this = Self {
            ctx,
            executor,
            command_rx,
            executor_events_rx,
            relay_events_tx,
            relay_events_rx,
            bundles: HashMap::new(),
            metrics: Arc::new(CoordinatorMetrics::default()),
        };
        (this, handle)
    }

    /// Creates a new [`CoordinatorService`] and spawns it.
    pub fn spawn(ctx: CoordinatorContext) -> CoordinatorHandle {
        let (this, handle) = Self::new(ctx);
        tokio::spawn(this.run());
        handle
    }

    /// Runs the event loop until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.command_rx.recv() => match message {
                    Some(message) => self.on_message(message),
                    None => break,
                },
                Some(event) = self.executor_events_rx.recv() => self.on_executor_event(event),
                Some(event) = self.relay_events_rx.recv() => self.on_relay_event(event),
            }
        }
    }

    fn on_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Submit { request, native_balances, reply } => {
                let _ = reply.send(self.submit(request, native_balances));
            }
            CoordinatorMessage::State { id, reply } => {
                let result = self
                    .bundles
                    .get(&id)
                    .map(|entry| entry.state.clone())
                    .ok_or(CoordinatorError::UnknownBundle(id));
                let _ = reply.send(result);
            }
            CoordinatorMessage::SelectPaymentChain { id, chain_id, reply } => {
                let _ = reply.send(self.select_payment_chain(id, chain_id));
            }
            CoordinatorMessage::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(id));
            }
            CoordinatorMessage::Reset { id, reply } => {
                let _ = reply.send(self.reset(id));
            }
        }
    }

    /// Decides the execution mode for a request.
    ///
    /// Bundling covers multi-chain requests unless declined; operations that
    /// move the caller's ERC-20 stay sequential, since their authorization is
    /// bound to the caller's own signer.
    fn execution_mode(request: &OperationRequest) -> ExecutionMode {
        if request.chains.len() > 1
            && request.bundling == BundlingPreference::Preferred
            && request.params.erc20_spend().is_none()
        {
            ExecutionMode::Bundled
        } else {
            ExecutionMode::Sequential
        }
    }

    #[instrument(skip_all, fields(kind = ?request.kind(), chains = request.chains.len()))]
    fn submit(
        &mut self,
        request: OperationRequest,
        native_balances: HashMap<ChainId, U256>,
    ) -> Result<BundleSubscription, CoordinatorError> {
        let id = BundleId::random();
        let mode = Self::execution_mode(&request);
        let mut state = BundleState::new(id, &request.chains);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (start_tx, start_rx) = oneshot::channel();

        debug!(%id, ?mode, "submitting bundle");
        self.metrics.bundles_submitted.increment(1);
        self.metrics.bundles_in_flight.increment(1);

        let start_tx = match mode {
            ExecutionMode::Bundled => {
                state.status = BundleStatus::Creating;
                let run = BundledRun {
                    relay: self.ctx.relay.clone(),
                    providers: self.ctx.providers.clone(),
                    config: self.ctx.config.clone(),
                    account: self.ctx.signer.address(),
                    bundle: id,
                    request: request.clone(),
                    events_tx: self.relay_events_tx.clone(),
                    start_rx,
                    cancel_rx,
                    poll_interval: self.ctx.config.relay.poll_interval,
                };
                tokio::spawn(run.run());
                Some(start_tx)
            }
            ExecutionMode::Sequential => {
                state.status = BundleStatus::Processing;
                let executor = self.executor.clone();
                let providers = self.ctx.providers.clone();
                let config = self.ctx.config.clone();
                let chains = request.chains.clone();
                tokio::spawn(async move {
                    // Strictly ordered: each chain reaches a terminal state
                    // before the next begins; one failure never halts the
                    // rest. Cancellation stops the run before the next chain
                    // prompts for a signature.
                    let resolver = TerminalResolver::new(providers, config);
                    for chain_id in chains {
                        if *cancel_rx.borrow() {
                            break;
                        }
                        executor.run_chain(id, &request, chain_id, &resolver).await;
                    }
                });
                None
            }
        };

        let (watch_tx, states) = watch::channel(state.clone());
        self.bundles.insert(
            id,
            BundleEntry {
                state,
                watch_tx,
                cancelled: false,
                mode,
                start_tx,
                cancel_tx,
                native_balances,
                submitted_at: Utc::now(),
            },
        );

        Ok(BundleSubscription { id, states })
    }

    fn select_payment_chain(
        &mut self,
        id: BundleId,
        chain_id: ChainId,
    ) -> Result<(), CoordinatorError> {
        let entry = self.bundles.get_mut(&id).ok_or(CoordinatorError::UnknownBundle(id))?;
        if entry.state.status != BundleStatus::AwaitingPayment {
            return Err(CoordinatorError::NotAwaitingPayment(id));
        }
        if !entry.state.payment_options.iter().any(|option| option.chain_id == chain_id) {
            return Err(CoordinatorError::InvalidPaymentChain(chain_id));
        }
        let Some(start_tx) = entry.start_tx.take() else {
            return Err(CoordinatorError::NotAwaitingPayment(id));
        };
        entry.state.payment_chain = Some(chain_id);
        entry.publish();
        let _ = start_tx.send(chain_id);
        Ok(())
    }

    fn cancel(&mut self, id: BundleId) -> Result<(), CoordinatorError> {
        let entry = self.bundles.get_mut(&id).ok_or(CoordinatorError::UnknownBundle(id))?;
        if !entry.cancelled {
            debug!(%id, mode = ?entry.mode, "cancelling bundle");
            entry.cancelled = true;
            let _ = entry.cancel_tx.send(true);
            entry.start_tx = None;
            if !entry.state.status.is_final() {
                self.metrics.bundles_cancelled.increment(1);
                self.metrics.bundles_in_flight.decrement(1);
            }
        }
        Ok(())
    }

    fn reset(&mut self, id: BundleId) -> Result<(), CoordinatorError> {
        let entry = self.bundles.get_mut(&id).ok_or(CoordinatorError::UnknownBundle(id))?;
        let was_live = !entry.cancelled && !entry.state.status.is_final();
        entry.cancelled = true;
        let _ = entry.cancel_tx.send(true);
        entry.start_tx = None;
        let chains: Vec<ChainId> =
            entry.state.chains.iter().map(|chain| chain.chain_id).collect();
        entry.state = BundleState::new(id, &chains);
        entry.publish();
        if was_live {
            self.metrics.bundles_in_flight.decrement(1);
        }
        Ok(())
    }

    /// Applies an executor update to its chain's state.
    fn on_executor_event(&mut self, event: ExecutorEvent) {
        let ExecutorEvent { bundle, chain_id, update } = event;
        let Some(entry) = self.bundles.get_mut(&bundle) else {
            return;
        };
        if entry.cancelled {
            self.metrics.stale_updates_discarded.increment(1);
            return;
        }
        apply_chain_update(entry, chain_id, update, &self.metrics);
        finish_if_terminal(entry, &self.metrics);
    }

    /// Applies a relay event to its bundle.
    #[instrument(skip_all)]
    fn on_relay_event(&mut self, event: RelayEvent) {
        let bundle = match &event {
            RelayEvent::ChainFailed { bundle, .. }
            | RelayEvent::Created { bundle, .. }
            | RelayEvent::Started { bundle }
            | RelayEvent::ChainStatus { bundle, .. }
            | RelayEvent::Aborted { bundle, .. } => *bundle,
        };
        let Some(entry) = self.bundles.get_mut(&bundle) else {
            return;
        };
        if entry.cancelled {
            self.metrics.stale_updates_discarded.increment(1);
            return;
        }

        match event {
            RelayEvent::ChainFailed { chain_id, error, .. } => {
                apply_chain_update(entry, chain_id, ChainUpdate::Failed(error), &self.metrics);
                finish_if_terminal(entry, &self.metrics);
            }
            RelayEvent::Created { bundle_uuid, payment_options, sponsored, .. } => {
                entry.state.relay_bundle_id = Some(bundle_uuid);
                entry.state.payment_options = payment_options;
                if sponsored {
                    // No payment chain needed; the run starts itself.
                    entry.publish();
                    return;
                }
                entry.state.status = BundleStatus::AwaitingPayment;
                if entry.state.payment_options.is_empty() {
                    // Absence of options means awaiting relay data, never
                    // "free to execute".
                    warn!(%bundle, "relay offered no payment options");
                    entry.publish();
                    return;
                }
                let ranked =
                    rank_options(&entry.state.payment_options, &entry.native_balances);
                if let Some(chain_id) = default_selection(&ranked)
                    && let Some(start_tx) = entry.start_tx.take()
                {
                    debug!(%bundle, chain_id, "auto-selected payment chain");
                    entry.state.payment_chain = Some(chain_id);
                    let _ = start_tx.send(chain_id);
                }
                entry.publish();
            }
            RelayEvent::Started { .. } => {
                entry.state.status = BundleStatus::Processing;
                entry.publish();
            }
            RelayEvent::ChainStatus { status, .. } => {
                if self.apply_relay_status(bundle, status) {
                    let entry = self.bundles.get_mut(&bundle).expect("entry checked above");
                    finish_if_terminal(entry, &self.metrics);
                }
            }
            RelayEvent::Aborted { error, .. } => {
                warn!(%bundle, %error, "bundled run aborted");
                // Bundle failure stays derived from chain states: every chain
                // still in flight fails with the abort reason.
                for chain in &mut entry.state.chains {
                    if chain.status.is_in_flight() {
                        chain.status = ChainStatus::Failed;
                        chain.error = Some(error.clone());
                        chain.finalized_at = Some(Utc::now());
                        self.metrics.chains_failed.increment(1);
                    }
                }
                entry.state.error = Some(error);
                finish_if_terminal(entry, &self.metrics);
                entry.publish();
            }
        }
    }

    /// Maps one relay-reported chain status onto the bundle's chain state.
    ///
    /// Returns whether the update was applied.
    fn apply_relay_status(&mut self, bundle: BundleId, status: RelayChainStatus) -> bool {
        let entry = self.bundles.get_mut(&bundle).expect("entry checked by caller");

        if entry.state.chain(status.chain_id).is_none() {
            // Invariant violation: the relay reported a chain outside the
            // request's target set.
            let err = CoordinatorError::RelayInconsistency { bundle, chain_id: status.chain_id };
            error!(%bundle, chain = %crate::config::chain_name(status.chain_id), "{err}");
            self.metrics.relay_inconsistencies.increment(1);
            entry.cancelled = true;
            let _ = entry.cancel_tx.send(true);
            entry.state.status = BundleStatus::Failed;
            entry.state.error = Some(err.to_string());
            self.metrics.bundles_failed.increment(1);
            self.metrics.bundles_in_flight.decrement(1);
            entry.publish();
            return false;
        }

        let update = match status.status {
            // Relay-side queueing maps onto the pre-submission state; there
            // is no per-chain signing step in bundled mode.
            RelayChainStatusCode::Queued => None,
            RelayChainStatusCode::Submitted => status.tx_hash.map(ChainUpdate::Submitted),
            RelayChainStatusCode::Confirmed => status.tx_hash.map(ChainUpdate::Confirmed),
            RelayChainStatusCode::Failed => Some(ChainUpdate::Failed(
                status.error.unwrap_or_else(|| "relay reported failure".to_string()),
            )),
        };

        let entry = self.bundles.get_mut(&bundle).expect("entry checked above");
        if let Some(project_id) = status.project_id
            && let Some(chain) = entry.state.chain_mut(status.chain_id)
        {
            chain.project_id = Some(project_id);
        }
        if let Some(update) = update {
            apply_chain_update(entry, status.chain_id, update, &self.metrics);
        } else {
            entry.publish();
        }
        true
    }
}

/// Applies one chain update through the single state-transition function.
///
/// Terminal chain states are never overwritten; out-of-order or repeated
/// updates for a settled chain are ignored.
fn apply_chain_update(
    entry: &mut BundleEntry,
    chain_id: ChainId,
    update: ChainUpdate,
    metrics: &CoordinatorMetrics,
) {
    let Some(chain) = entry.state.chain_mut(chain_id) else {
        warn!(chain_id, "update for chain outside the bundle");
        return;
    };
    if chain.status.is_final() {
        return;
    }

    match update {
        ChainUpdate::Signing => {
            chain.status = ChainStatus::Signing;
            chain.started_at.get_or_insert_with(Utc::now);
        }
        ChainUpdate::Submitted(hash) => {
            chain.status = ChainStatus::Submitted;
            chain.tx_hash = Some(hash);
            chain.started_at.get_or_insert_with(Utc::now);
        }
        ChainUpdate::Confirmed(hash) => {
            chain.status = ChainStatus::Confirmed;
            chain.tx_hash = Some(hash);
            chain.finalized_at = Some(Utc::now());
            metrics.chains_confirmed.increment(1);
        }
        ChainUpdate::Failed(message) => {
            chain.status = ChainStatus::Failed;
            chain.error = Some(message);
            chain.finalized_at = Some(Utc::now());
            metrics.chains_failed.increment(1);
        }
        ChainUpdate::Cancelled => {
            chain.status = ChainStatus::Cancelled;
            chain.finalized_at = Some(Utc::now());
            metrics.user_cancellations.increment(1);
        }
    }
    entry.publish();
}

/// Settles the bundle when the derived aggregate reaches a terminal status.
///
/// The aggregate is purely derived from chain states; pre-execution phases
/// (creating, awaiting payment) settle too once every chain is terminal, which
/// happens when no chain survives preparation.
fn finish_if_terminal(entry: &mut BundleEntry, metrics: &CoordinatorMetrics) {
    if entry.state.status.is_final() {
        return;
    }
    let aggregate = entry.state.aggregate_status();
    if !aggregate.is_final() {
        return;
    }
    entry.state.status = aggregate;
    match aggregate {
        BundleStatus::Completed => metrics.bundles_completed.increment(1),
        _ => metrics.bundles_failed.increment(1),
    }
    metrics.bundles_in_flight.decrement(1);
    metrics
        .completion_time
        .record(Utc::now().signed_duration_since(entry.submitted_at).num_milliseconds() as f64);
    // Stop the background task; the bundle is settled.
    let _ = entry.cancel_tx.send(true);
    entry.publish();
}
