//! Operation request types.
//!
//! An [`OperationRequest`] describes one logical operation submitted against
//! the same contract suite on several chains. It is immutable once handed to
//! the coordinator; re-invoking an operation means submitting a new request.

use super::contracts::{ProjectMetadata, RulesetConfig, TerminalConfig, TierConfig};
use crate::constants::NATIVE_TOKEN;
use alloy::primitives::{Address, B256, Bytes, ChainId, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Pay a project.
    Pay,
    /// Cash out project tokens.
    CashOut,
    /// Use a project's surplus allowance.
    UseAllowance,
    /// Queue rulesets on a project.
    QueueRuleset,
    /// Launch a new project.
    LaunchProject,
    /// Deploy a revnet.
    DeployRevnet,
    /// Deploy cross-chain peers for a project.
    DeploySuckers,
    /// Adjust NFT tiers on a hook.
    AdjustTiers,
}

/// Parameters of a `pay` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayParams {
    /// Token the payment is made in. [`NATIVE_TOKEN`] for the chain's native
    /// asset.
    pub token: Address,
    /// Amount paid, in the token's smallest unit.
    pub amount: U256,
    /// Recipient of the project tokens minted by the payment.
    pub beneficiary: Address,
    /// Minimum project tokens the payment must mint.
    pub min_returned_tokens: U256,
    /// Secondary protocol fee charged on the same chain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeCall>,
}

/// A secondary protocol fee payment paired with a primary payment call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCall {
    /// Project collecting the fee.
    pub project_id: u64,
    /// Fee amount in the payment token.
    pub amount: U256,
    /// Memo attached to the fee payment.
    #[serde(default)]
    pub memo: String,
}

/// Parameters of a `cashOutTokensOf` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashOutParams {
    /// Holder whose tokens are cashed out.
    pub holder: Address,
    /// Number of project tokens to cash out.
    pub cash_out_count: U256,
    /// Token to reclaim from the terminal.
    pub token_to_reclaim: Address,
    /// Minimum tokens that must be reclaimed.
    pub min_tokens_reclaimed: U256,
    /// Recipient of the reclaimed tokens.
    pub beneficiary: Address,
}

/// Parameters of a `useAllowanceOf` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseAllowanceParams {
    /// Token to pay out.
    pub token: Address,
    /// Amount to pay out.
    pub amount: U256,
    /// Currency the amount is denominated in.
    pub currency: U256,
    /// Minimum tokens that must be paid out.
    pub min_tokens_paid_out: U256,
    /// Recipient of the payout.
    pub beneficiary: Address,
    /// Recipient of any fee refund.
    pub fee_beneficiary: Address,
}

/// Parameters of a `queueRulesetsOf` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRulesetParams {
    /// Rulesets to queue, in order.
    pub configs: Vec<RulesetConfig>,
}

/// Parameters of a `launchProjectFor` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchProjectParams {
    /// Owner of the new project.
    pub owner: Address,
    /// Project metadata pointer.
    pub metadata: ProjectMetadata,
    /// Initial rulesets.
    pub configs: Vec<RulesetConfig>,
    /// Terminals the project accepts.
    pub terminals: Vec<TerminalConfig>,
}

/// Parameters of a revnet `deployFor` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRevnetParams {
    /// Owner of the revnet.
    pub owner: Address,
    /// Revnet metadata pointer.
    pub metadata: ProjectMetadata,
    /// Initial rulesets.
    pub configs: Vec<RulesetConfig>,
    /// Terminals the revnet accepts.
    pub terminals: Vec<TerminalConfig>,
    /// Salt for deterministic cross-chain addressing.
    pub salt: B256,
}

/// Parameters of a `deploySuckersFor` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySuckersParams {
    /// Salt for deterministic cross-chain addressing.
    pub salt: B256,
    /// Opaque per-deployer configuration blobs.
    pub deployer_configurations: Vec<Bytes>,
}

/// Parameters of an `adjustTiers` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustTiersParams {
    /// The tiered hook to adjust. Deterministic deployment gives it the same
    /// address on every target chain.
    pub hook: Address,
    /// Tiers to add.
    pub tiers_to_add: Vec<TierConfig>,
    /// Ids of tiers to remove.
    pub tier_ids_to_remove: Vec<U256>,
}

/// Typed parameter payload, tagged by operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OperationParams {
    /// Pay a project.
    Pay(PayParams),
    /// Cash out project tokens.
    CashOut(CashOutParams),
    /// Use a project's surplus allowance.
    UseAllowance(UseAllowanceParams),
    /// Queue rulesets.
    QueueRuleset(QueueRulesetParams),
    /// Launch a project.
    LaunchProject(LaunchProjectParams),
    /// Deploy a revnet.
    DeployRevnet(DeployRevnetParams),
    /// Deploy cross-chain peers.
    DeploySuckers(DeploySuckersParams),
    /// Adjust NFT tiers.
    AdjustTiers(AdjustTiersParams),
}

impl OperationParams {
    /// Returns the kind of the operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Pay(_) => OperationKind::Pay,
            Self::CashOut(_) => OperationKind::CashOut,
            Self::UseAllowance(_) => OperationKind::UseAllowance,
            Self::QueueRuleset(_) => OperationKind::QueueRuleset,
            Self::LaunchProject(_) => OperationKind::LaunchProject,
            Self::DeployRevnet(_) => OperationKind::DeployRevnet,
            Self::DeploySuckers(_) => OperationKind::DeploySuckers,
            Self::AdjustTiers(_) => OperationKind::AdjustTiers,
        }
    }

    /// Returns the ERC-20 token and total amount this operation moves out of
    /// the caller's account, if any.
    ///
    /// Only such operations enter the allowance/permit flow.
    pub fn erc20_spend(&self) -> Option<(Address, U256)> {
        match self {
            Self::Pay(params) if params.token != NATIVE_TOKEN => {
                let fee = params.fee.as_ref().map(|fee| fee.amount).unwrap_or(U256::ZERO);
                Some((params.token, params.amount.saturating_add(fee)))
            }
            _ => None,
        }
    }

    /// Returns the total native value this operation attaches on one chain.
    pub fn native_value(&self) -> U256 {
        match self {
            Self::Pay(params) if params.token == NATIVE_TOKEN => {
                let fee = params.fee.as_ref().map(|fee| fee.amount).unwrap_or(U256::ZERO);
                params.amount.saturating_add(fee)
            }
            _ => U256::ZERO,
        }
    }
}

/// Whether a multi-chain request goes through the bundling relay or is driven
/// chain by chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BundlingPreference {
    /// Use the gas-sponsored bundled path for multi-chain requests.
    #[default]
    Preferred,
    /// Drive each chain sequentially even for multi-chain requests.
    Declined,
}

/// One logical operation to submit across several chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Typed parameter payload.
    pub params: OperationParams,
    /// Target chains, in caller order. Per-chain state is reported in this
    /// order.
    pub chains: Vec<ChainId>,
    /// Target project id per chain.
    ///
    /// Empty for operations that create projects; bundled creation can yield
    /// a different id per chain, reported back through the per-chain state.
    #[serde(default)]
    pub project_ids: HashMap<ChainId, u64>,
    /// Synchronized activation timestamp applied to every queued ruleset, if
    /// any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<u64>,
    /// Operation memo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Bundling preference for multi-chain requests.
    #[serde(default)]
    pub bundling: BundlingPreference,
}

impl OperationRequest {
    /// Returns the project id targeted on the given chain, if known.
    pub fn project_id_on(&self, chain_id: ChainId) -> Option<u64> {
        self.project_ids.get(&chain_id).copied()
    }

    /// Returns the kind of the operation.
    pub fn kind(&self) -> OperationKind {
        self.params.kind()
    }
}
