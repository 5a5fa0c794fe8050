//! Chain call builder.
//!
//! Maps an operation's typed parameters onto the canonical contract call for
//! one chain. Building is pure and deterministic: the same inputs always
//! produce byte-identical call data. Business values are not validated here
//! (that is the verification engine's job); structural completeness is.

use crate::{
    constants::NATIVE_TOKEN,
    error::CallBuilderError,
    types::{
        AllowanceSignature, FeeCall, OperationParams, PreparedCall,
        contracts::{IController, IRevnetDeployer, ISuckerRegistry, ITerminal, ITieredHook, RulesetConfig},
    },
};
use alloy::{
    primitives::{Address, Bytes, U256, aliases::U48},
    sol_types::SolCall,
};

/// Inputs the builder needs beyond the typed parameters.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The resolved contract the call targets (terminal, controller, deployer
    /// or hook, depending on the operation).
    pub target: Address,
    /// The project targeted on this chain. Zero for project-creating
    /// operations.
    pub project_id: u64,
    /// Operation memo.
    pub memo: String,
    /// Synchronized activation timestamp to stamp onto ruleset configs.
    pub activation: Option<u64>,
}

/// Builds the calls for one chain's share of an operation.
///
/// Most operations produce exactly one call. A payment carrying a secondary
/// protocol fee produces two, primary first; the allowance metadata blob, when
/// present, is consumed by the first call only.
pub fn build_calls(
    params: &OperationParams,
    ctx: &CallContext,
    allowance: Option<AllowanceSignature>,
) -> Result<Vec<PreparedCall>, CallBuilderError> {
    let metadata: Bytes = allowance.map(AllowanceSignature::into_metadata).unwrap_or_default();

    let calls = match params {
        OperationParams::Pay(params) => {
            let project_id = require_project(ctx)?;
            let mut calls = vec![pay_call(
                ctx.target,
                project_id,
                params.token,
                params.amount,
                params.beneficiary,
                params.min_returned_tokens,
                ctx.memo.clone(),
                metadata,
            )];
            if let Some(fee) = &params.fee {
                calls.push(fee_call(ctx.target, params.token, params.beneficiary, fee));
            }
            calls
        }
        OperationParams::CashOut(params) => {
            let project_id = require_project(ctx)?;
            vec![PreparedCall::new(
                ctx.target,
                ITerminal::cashOutTokensOfCall {
                    holder: params.holder,
                    projectId: U256::from(project_id),
                    cashOutCount: params.cash_out_count,
                    tokenToReclaim: params.token_to_reclaim,
                    minTokensReclaimed: params.min_tokens_reclaimed,
                    beneficiary: params.beneficiary,
                    metadata,
                }
                .abi_encode(),
            )]
        }
        OperationParams::UseAllowance(params) => {
            let project_id = require_project(ctx)?;
            vec![PreparedCall::new(
                ctx.target,
                ITerminal::useAllowanceOfCall {
                    projectId: U256::from(project_id),
                    token: params.token,
                    amount: params.amount,
                    currency: params.currency,
                    minTokensPaidOut: params.min_tokens_paid_out,
                    beneficiary: params.beneficiary,
                    feeBeneficiary: params.fee_beneficiary,
                    memo: ctx.memo.clone(),
                }
                .abi_encode(),
            )]
        }
        OperationParams::QueueRuleset(params) => {
            let project_id = require_project(ctx)?;
            if params.configs.is_empty() {
                return Err(CallBuilderError::MalformedParameters("ruleset configs are empty"));
            }
            vec![PreparedCall::new(
                ctx.target,
                IController::queueRulesetsOfCall {
                    projectId: U256::from(project_id),
                    configs: stamped(params.configs.clone(), ctx.activation),
                    memo: ctx.memo.clone(),
                }
                .abi_encode(),
            )]
        }
        OperationParams::LaunchProject(params) => {
            if params.configs.is_empty() {
                return Err(CallBuilderError::MalformedParameters("ruleset configs are empty"));
            }
            vec![PreparedCall::new(
                ctx.target,
                IController::launchProjectForCall {
                    owner: params.owner,
                    meta: params.metadata.clone(),
                    configs: stamped(params.configs.clone(), ctx.activation),
                    terminals: params.terminals.clone(),
                    memo: ctx.memo.clone(),
                }
                .abi_encode(),
            )]
        }
        OperationParams::DeployRevnet(params) => {
            if params.configs.is_empty() {
                return Err(CallBuilderError::MalformedParameters("ruleset configs are empty"));
            }
            vec![PreparedCall::new(
                ctx.target,
                IRevnetDeployer::deployForCall {
                    owner: params.owner,
                    meta: params.metadata.clone(),
                    configs: stamped(params.configs.clone(), ctx.activation),
                    terminals: params.terminals.clone(),
                    salt: params.salt,
                    memo: ctx.memo.clone(),
                }
                .abi_encode(),
            )]
        }
        OperationParams::DeploySuckers(params) => {
            let project_id = require_project(ctx)?;
            if params.deployer_configurations.is_empty() {
                return Err(CallBuilderError::MalformedParameters(
                    "deployer configurations are empty",
                ));
            }
            vec![PreparedCall::new(
                ctx.target,
                ISuckerRegistry::deploySuckersForCall {
                    projectId: U256::from(project_id),
                    salt: params.salt,
                    deployerConfigurations: params.deployer_configurations.clone(),
                }
                .abi_encode(),
            )]
        }
        OperationParams::AdjustTiers(params) => {
            if params.tiers_to_add.is_empty() && params.tier_ids_to_remove.is_empty() {
                return Err(CallBuilderError::MalformedParameters(
                    "tier adjustment adds and removes nothing",
                ));
            }
            vec![PreparedCall::new(
                ctx.target,
                ITieredHook::adjustTiersCall {
                    tiersToAdd: params.tiers_to_add.clone(),
                    tierIdsToRemove: params.tier_ids_to_remove.clone(),
                }
                .abi_encode(),
            )]
        }
    };

    Ok(calls)
}

fn require_project(ctx: &CallContext) -> Result<u64, CallBuilderError> {
    if ctx.project_id == 0 {
        return Err(CallBuilderError::MalformedParameters("project id is required"));
    }
    Ok(ctx.project_id)
}

/// Overrides each config's start floor with the synchronized activation
/// timestamp, when one was requested.
fn stamped(mut configs: Vec<RulesetConfig>, activation: Option<u64>) -> Vec<RulesetConfig> {
    if let Some(activation) = activation {
        for config in &mut configs {
            config.mustStartAtOrAfter = U48::from(activation);
        }
    }
    configs
}

#[allow(clippy::too_many_arguments)]
fn pay_call(
    target: Address,
    project_id: u64,
    token: Address,
    amount: U256,
    beneficiary: Address,
    min_returned_tokens: U256,
    memo: String,
    metadata: Bytes,
) -> PreparedCall {
    let value = if token == NATIVE_TOKEN { amount } else { U256::ZERO };
    PreparedCall::new(
        target,
        ITerminal::payCall {
            projectId: U256::from(project_id),
            token,
            amount,
            beneficiary,
            minReturnedTokens: min_returned_tokens,
            memo,
            metadata,
        }
        .abi_encode(),
    )
    .with_value(value)
}

/// Builds the secondary protocol-fee payment paired with a primary payment.
///
/// The fee routes through the same terminal; ordering (primary first, fee
/// second) is fixed by the executor's contract.
fn fee_call(target: Address, token: Address, beneficiary: Address, fee: &FeeCall) -> PreparedCall {
    pay_call(
        target,
        fee.project_id,
        token,
        fee.amount,
        beneficiary,
        U256::ZERO,
        fee.memo.clone(),
        Bytes::new(),
    )
}
