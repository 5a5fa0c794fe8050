//! Bundled-mode execution task.
//!
//! One task per bundle handed to the external relay. The task builds the
//! per-chain calls, creates the relay bundle, waits for a payment chain
//! selection, then polls per-chain status until every chain is terminal. All
//! observations flow back to the coordinator as [`RelayEvent`]s; the task
//! never touches bundle state itself.

use crate::{
    builder::{CallContext, build_calls},
    config::OrchestratorConfig,
    error::truncate_for_display,
    relay::RelayApi,
    resolver::{Providers, TerminalResolver},
    types::{
        BundleId, OperationRequest, PaymentOption,
        relay::{
            RelayBundleRequest, RelayChainStatus, RelayChainStatusCode, RelayTransactionRequest,
        },
    },
};
use alloy::primitives::{Address, ChainId};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument, warn};

/// Number of consecutive failed status polls after which the bundle is
/// considered lost.
const MAX_POLL_FAILURES: usize = 5;

/// Events emitted by a bundled run.
#[derive(Debug)]
pub(crate) enum RelayEvent {
    /// A chain could not be prepared and was excluded from the bundle.
    ChainFailed {
        /// The affected bundle.
        bundle: BundleId,
        /// The excluded chain.
        chain_id: ChainId,
        /// Failure message.
        error: String,
    },
    /// The relay accepted the bundle.
    Created {
        /// The affected bundle.
        bundle: BundleId,
        /// The relay's identifier.
        bundle_uuid: String,
        /// Offered payment options, in relay order.
        payment_options: Vec<PaymentOption>,
        /// Whether the relay sponsors the bundle outright.
        sponsored: bool,
    },
    /// The relay began executing the bundle.
    Started {
        /// The affected bundle.
        bundle: BundleId,
    },
    /// A per-chain status report from the relay.
    ChainStatus {
        /// The affected bundle.
        bundle: BundleId,
        /// The reported status.
        status: RelayChainStatus,
    },
    /// The run ended without the relay completing the bundle.
    Aborted {
        /// The affected bundle.
        bundle: BundleId,
        /// What went wrong.
        error: String,
    },
}

/// A bundled execution run.
pub(crate) struct BundledRun {
    pub relay: Arc<dyn RelayApi>,
    pub providers: Providers,
    pub config: Arc<OrchestratorConfig>,
    pub account: Address,
    pub bundle: BundleId,
    pub request: OperationRequest,
    pub events_tx: mpsc::UnboundedSender<RelayEvent>,
    pub start_rx: oneshot::Receiver<ChainId>,
    pub cancel_rx: watch::Receiver<bool>,
    pub poll_interval: Duration,
}

impl BundledRun {
    fn emit(&self, event: RelayEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Runs the bundle to completion, cancellation, or abort.
    #[instrument(skip(self), fields(bundle = %self.bundle))]
    pub(crate) async fn run(mut self) {
        let bundle = self.bundle;

        // Build one call set per chain; a chain that cannot be prepared is
        // excluded without affecting its siblings.
        let resolver = TerminalResolver::new(self.providers.clone(), self.config.clone());
        let mut transactions = Vec::new();
        let mut included: HashSet<ChainId> = HashSet::new();
        for chain_id in self.request.chains.clone() {
            let project_id = self.request.project_id_on(chain_id).unwrap_or(0);
            let prepared = match resolver
                .target_for(&self.request.params, chain_id, project_id)
                .await
            {
                Ok(target) => {
                    let ctx = CallContext {
                        target,
                        project_id,
                        memo: self.request.memo.clone().unwrap_or_default(),
                        activation: self.request.activation,
                    };
                    build_calls(&self.request.params, &ctx, None).map_err(|err| err.to_string())
                }
                Err(err) => Err(err.to_string()),
            };
            match prepared {
                Ok(calls) => {
                    included.insert(chain_id);
                    transactions.extend(calls.into_iter().map(|call| RelayTransactionRequest {
                        chain_id,
                        target: call.target,
                        data: call.data,
                        value: call.value,
                    }));
                }
                Err(error) => {
                    self.emit(RelayEvent::ChainFailed {
                        bundle,
                        chain_id,
                        error: truncate_for_display(error),
                    });
                }
            }
        }

        if included.is_empty() {
            self.emit(RelayEvent::Aborted {
                bundle,
                error: "no chain could be prepared".to_string(),
            });
            return;
        }

        let created = match self
            .relay
            .create_bundle(&RelayBundleRequest { from: self.account, transactions })
            .await
        {
            Ok(created) => created,
            Err(err) => {
                self.emit(RelayEvent::Aborted {
                    bundle,
                    error: truncate_for_display(err.to_string()),
                });
                return;
            }
        };
        let bundle_uuid = created.bundle_uuid.clone();
        self.emit(RelayEvent::Created {
            bundle,
            bundle_uuid: bundle_uuid.clone(),
            payment_options: created.payment_options,
            sponsored: created.sponsored,
        });

        if created.sponsored {
            // Sponsored bundles execute without a payment chain.
            self.emit(RelayEvent::Started { bundle });
        } else {
            let payment_chain = tokio::select! {
                selection = &mut self.start_rx => match selection {
                    Ok(chain_id) => chain_id,
                    // The coordinator dropped the sender: bundle was cancelled
                    // or reset before a selection was made.
                    Err(_) => return,
                },
                _ = self.cancel_rx.changed() => return,
            };

            if let Err(err) = self.relay.start_bundle(&bundle_uuid, payment_chain).await {
                self.emit(RelayEvent::Aborted {
                    bundle,
                    error: truncate_for_display(err.to_string()),
                });
                return;
            }
            self.emit(RelayEvent::Started { bundle });
        }

        self.poll(&bundle_uuid, included).await;
    }

    /// Polls per-chain status until every included chain is terminal.
    async fn poll(mut self, bundle_uuid: &str, included: HashSet<ChainId>) {
        let bundle = self.bundle;
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut terminal: HashSet<ChainId> = HashSet::new();
        let mut failures = 0usize;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel_rx.changed() => {
                    debug!("bundle cancelled, stopping status polls");
                    return;
                }
            }

            let status = match self.relay.bundle_status(bundle_uuid).await {
                Ok(status) => {
                    failures = 0;
                    status
                }
                Err(err) => {
                    failures += 1;
                    warn!(%err, failures, "relay status poll failed");
                    if failures >= MAX_POLL_FAILURES {
                        self.emit(RelayEvent::Aborted {
                            bundle,
                            error: truncate_for_display(err.to_string()),
                        });
                        return;
                    }
                    continue;
                }
            };

            for chain in status.chains {
                if matches!(
                    chain.status,
                    RelayChainStatusCode::Confirmed | RelayChainStatusCode::Failed
                ) {
                    terminal.insert(chain.chain_id);
                }
                self.emit(RelayEvent::ChainStatus { bundle, status: chain });
            }

            if included.iter().all(|chain_id| terminal.contains(chain_id)) {
                return;
            }
        }
    }
}
