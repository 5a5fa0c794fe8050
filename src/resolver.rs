//! Terminal/controller resolution.
//!
//! Looks up, per chain and per project, which contract instance is
//! authoritative for a given payment token. Results are cached for the
//! lifetime of one operation flow only; terminal assignments can change
//! between sessions, so the cache is never reused across operations.

use crate::{
    config::{ChainConfig, OrchestratorConfig, RpcConfig},
    error::ResolverError,
    types::{OperationParams, contracts::IDirectory},
};
use alloy::{
    primitives::{Address, ChainId, U256},
    providers::DynProvider,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::time::timeout;
use tracing::debug;

/// Providers for every supported chain, keyed by chain id.
pub type Providers = Arc<HashMap<ChainId, DynProvider>>;

/// Sentinel token for controller cache entries.
const CONTROLLER_SLOT: Address = Address::ZERO;

/// Resolves authoritative contracts for one operation flow.
///
/// Construct one per flow and drop it when the flow ends.
#[derive(Debug)]
pub struct TerminalResolver {
    providers: Providers,
    config: Arc<OrchestratorConfig>,
    cache: Mutex<HashMap<(ChainId, u64, Address), Address>>,
}

impl TerminalResolver {
    /// Creates a resolver bound to one operation flow.
    pub fn new(providers: Providers, config: Arc<OrchestratorConfig>) -> Self {
        Self { providers, config, cache: Mutex::new(HashMap::new()) }
    }

    fn chain(&self, chain_id: ChainId) -> Result<(&ChainConfig, &DynProvider), ResolverError> {
        let config =
            self.config.chain(chain_id).ok_or(ResolverError::UnsupportedChain(chain_id))?;
        let provider =
            self.providers.get(&chain_id).ok_or(ResolverError::UnsupportedChain(chain_id))?;
        Ok((config, provider))
    }

    fn cached(&self, key: (ChainId, u64, Address)) -> Option<Address> {
        self.cache.lock().expect("resolver cache poisoned").get(&key).copied()
    }

    fn store(&self, key: (ChainId, u64, Address), value: Address) {
        self.cache.lock().expect("resolver cache poisoned").insert(key, value);
    }

    /// Resolves the terminal authoritative for `token` on `chain_id`.
    ///
    /// Falls back to the chain's swap-capable terminal when the directory has
    /// no direct route. Failure is fatal for this chain only.
    pub async fn primary_terminal(
        &self,
        chain_id: ChainId,
        project_id: u64,
        token: Address,
    ) -> Result<Address, ResolverError> {
        let key = (chain_id, project_id, token);
        if let Some(terminal) = self.cached(key) {
            return Ok(terminal);
        }

        let (config, provider) = self.chain(chain_id)?;
        let directory = IDirectory::new(config.directory, provider.clone());
        let terminal = bounded_read(&self.config.rpc, || {
            let directory = directory.clone();
            async move { directory.primaryTerminalOf(U256::from(project_id), token).call().await }
        })
        .await
        .map_err(|err| err.into_resolver(chain_id))?;

        let terminal = if terminal == Address::ZERO {
            if config.swap_terminal == Address::ZERO {
                return Err(ResolverError::TerminalNotFound { chain_id, project_id, token });
            }
            debug!(chain_id, project_id, %token, "no direct terminal, using swap terminal");
            config.swap_terminal
        } else {
            terminal
        };

        self.store(key, terminal);
        Ok(terminal)
    }

    /// Resolves the controller of `project_id` on `chain_id`.
    ///
    /// Projects that do not exist yet resolve to the chain's configured
    /// controller.
    pub async fn controller(
        &self,
        chain_id: ChainId,
        project_id: u64,
    ) -> Result<Address, ResolverError> {
        let key = (chain_id, project_id, CONTROLLER_SLOT);
        if let Some(controller) = self.cached(key) {
            return Ok(controller);
        }

        let (config, provider) = self.chain(chain_id)?;
        let controller = if project_id == 0 {
            config.controller
        } else {
            let directory = IDirectory::new(config.directory, provider.clone());
            let resolved = bounded_read(&self.config.rpc, || {
                let directory = directory.clone();
                async move { directory.controllerOf(U256::from(project_id)).call().await }
            })
            .await
            .map_err(|err| err.into_resolver(chain_id))?;
            if resolved == Address::ZERO { config.controller } else { resolved }
        };

        self.store(key, controller);
        Ok(controller)
    }

    /// Resolves the call target for one chain's share of an operation.
    pub async fn target_for(
        &self,
        params: &OperationParams,
        chain_id: ChainId,
        project_id: u64,
    ) -> Result<Address, ResolverError> {
        match params {
            OperationParams::Pay(params) => {
                self.primary_terminal(chain_id, project_id, params.token).await
            }
            OperationParams::CashOut(params) => {
                self.primary_terminal(chain_id, project_id, params.token_to_reclaim).await
            }
            OperationParams::UseAllowance(params) => {
                self.primary_terminal(chain_id, project_id, params.token).await
            }
            OperationParams::QueueRuleset(_) | OperationParams::LaunchProject(_) => {
                self.controller(chain_id, project_id).await
            }
            OperationParams::DeployRevnet(_) => {
                let (config, _) = self.chain(chain_id)?;
                Ok(config.revnet_deployer)
            }
            OperationParams::DeploySuckers(_) => {
                let (config, _) = self.chain(chain_id)?;
                Ok(config.sucker_registry)
            }
            OperationParams::AdjustTiers(params) => Ok(params.hook),
        }
    }
}

/// Failure of a bounded read-only contract call.
#[derive(Debug)]
pub(crate) enum ReadError {
    /// All attempts timed out.
    TimedOut,
    /// The call itself failed.
    Contract(alloy::contract::Error),
}

impl ReadError {
    fn into_resolver(self, chain_id: ChainId) -> ResolverError {
        match self {
            Self::TimedOut => ResolverError::Timeout(chain_id),
            Self::Contract(err) => ResolverError::Contract(err),
        }
    }
}

/// Runs a read-only contract call with a bounded timeout and a single retry
/// on timeout, per the RPC read policy.
pub(crate) async fn bounded_read<T, F, Fut>(rpc: &RpcConfig, call: F) -> Result<T, ReadError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, alloy::contract::Error>>,
{
    let mut attempts = 0;
    loop {
        match timeout(rpc.read_timeout, call()).await {
            Ok(result) => return result.map_err(ReadError::Contract),
            Err(_) if attempts < rpc.read_retries => {
                attempts += 1;
                debug!(attempts, "read timed out, retrying");
            }
            Err(_) => return Err(ReadError::TimedOut),
        }
    }
}
