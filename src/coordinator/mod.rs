//! Bundle coordination.
//!
//! The coordinator decides whether a request executes sequentially or as one
//! gas-sponsored multi-chain bundle, tracks every chain through its state
//! machine, and exposes one bundle-level status to callers. It owns all
//! bundle state exclusively; callers interact through a cloneable handle and
//! receive immutable snapshots.

use crate::{
    config::OrchestratorConfig,
    relay::RelayApi,
    resolver::Providers,
    signers::OperationSigner,
    types::{OperationRequest, contracts::IERC20},
    verify::VerificationContext,
};
use alloy::{
    primitives::ChainId,
    providers::{DynProvider, Provider, ProviderBuilder},
};
use chrono::Utc;
use futures_util::future::join_all;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

mod bundled;

mod service;
pub use service::{BundleSubscription, CoordinatorHandle, CoordinatorService};

/// Explicit context the coordinator is constructed with.
///
/// Nothing is read from process-wide state: chain providers, the signing
/// backend and the relay client are all passed in here.
#[derive(Debug, Clone)]
pub struct CoordinatorContext {
    /// Orchestrator configuration.
    pub config: Arc<OrchestratorConfig>,
    /// Providers for every supported chain.
    pub providers: Providers,
    /// The signing backend driving transactions.
    pub signer: Arc<dyn OperationSigner>,
    /// The bundling relay client.
    pub relay: Arc<dyn RelayApi>,
}

/// Builds HTTP providers for every configured chain.
pub fn http_providers(config: &OrchestratorConfig) -> Providers {
    Arc::new(
        config
            .chains
            .iter()
            .map(|(chain_id, chain)| {
                let provider: DynProvider =
                    ProviderBuilder::new().connect_http(chain.rpc_url.clone()).erased();
                (*chain_id, provider)
            })
            .collect::<HashMap<ChainId, DynProvider>>(),
    )
}

/// Gathers the balance/clock snapshot verification runs against.
///
/// Chains are read concurrently; a pending read on one chain never blocks
/// another. Reads that fail leave their entry absent; the verification engine
/// treats unknown balances as unverifiable rather than as doubts.
pub(crate) async fn gather_verification_context(
    ctx: &CoordinatorContext,
    request: &OperationRequest,
) -> VerificationContext {
    let mut snapshot = VerificationContext {
        now: Some(Utc::now().timestamp() as u64),
        ..Default::default()
    };
    let owner = ctx.signer.address();
    let erc20 = request.params.erc20_spend();

    let reads = request.chains.iter().filter_map(|chain_id| {
        let provider = ctx.providers.get(chain_id)?.clone();
        Some(async move {
            let native = provider.get_balance(owner).await;
            let token_balance = match erc20 {
                Some((token, _)) => {
                    Some((token, IERC20::new(token, provider).balanceOf(owner).call().await))
                }
                None => None,
            };
            (*chain_id, native, token_balance)
        })
    });

    for (chain_id, native, token_balance) in join_all(reads).await {
        match native {
            Ok(balance) => {
                snapshot.native_balances.insert(chain_id, balance);
            }
            Err(err) => debug!(chain_id, %err, "native balance read failed"),
        }
        if let Some((token, read)) = token_balance {
            match read {
                Ok(balance) => {
                    snapshot.erc20_balances.insert((chain_id, token), balance);
                }
                Err(err) => debug!(chain_id, %token, %err, "token balance read failed"),
            }
        }
    }

    snapshot
}
