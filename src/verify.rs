//! Transaction verification engine.
//!
//! Inspects a fully-built parameter set and flags anomalies before signing is
//! allowed. Verification is a pure function of its inputs: no side effects, no
//! network calls, and identical inputs always yield identical doubt lists in
//! identical order. The engine is conservative; false-positive warnings are
//! acceptable, suppressing a known-dangerous pattern is not.

use crate::{
    constants::MEMO_WARN_LEN,
    types::{
        DoubtSeverity, OperationParams, OperationRequest, TransactionDoubt,
        contracts::{MAX_FEE_PERCENT, RulesetConfig, SPLITS_TOTAL_PERCENT},
    },
};
use alloy::primitives::{Address, ChainId, U256};
use std::collections::{HashMap, HashSet};

/// Snapshot of balances and clock taken before verification.
///
/// Gathering the snapshot is the caller's (I/O-performing) job; verification
/// itself only reads it.
#[derive(Debug, Clone, Default)]
pub struct VerificationContext {
    /// Native balance per target chain.
    pub native_balances: HashMap<ChainId, U256>,
    /// ERC-20 balances per (chain, token).
    pub erc20_balances: HashMap<(ChainId, Address), U256>,
    /// Current unix timestamp, if known.
    pub now: Option<u64>,
}

/// Produces the ordered doubt list for a request.
///
/// Critical doubts come first, then warnings; within each severity the order
/// of discovery is preserved.
pub fn verify(request: &OperationRequest, ctx: &VerificationContext) -> Vec<TransactionDoubt> {
    let mut doubts = Vec::new();

    check_target_chains(request, &mut doubts);
    check_params(&request.params, &mut doubts);
    check_balances(request, ctx, &mut doubts);
    check_activation(request, ctx, &mut doubts);
    check_memo(request, &mut doubts);

    // Stable partition: criticals first, discovery order kept within each
    // severity.
    let (critical, warning): (Vec<_>, Vec<_>) =
        doubts.into_iter().partition(|doubt| doubt.severity == DoubtSeverity::Critical);
    critical.into_iter().chain(warning).collect()
}

fn check_target_chains(request: &OperationRequest, doubts: &mut Vec<TransactionDoubt>) {
    if request.chains.is_empty() {
        doubts.push(TransactionDoubt::critical("operation targets no chains").on("chains"));
    }
    let mut seen = HashSet::new();
    for chain_id in &request.chains {
        if !seen.insert(*chain_id) {
            doubts.push(
                TransactionDoubt::critical(format!("chain {chain_id} is targeted more than once"))
                    .on("chains"),
            );
        }
    }
}

fn check_params(params: &OperationParams, doubts: &mut Vec<TransactionDoubt>) {
    match params {
        OperationParams::Pay(params) => {
            if params.beneficiary == Address::ZERO {
                doubts.push(
                    TransactionDoubt::critical("beneficiary is the zero address")
                        .on("beneficiary"),
                );
            }
            if params.amount == U256::ZERO {
                doubts.push(TransactionDoubt::warning("payment amount is zero").on("amount"));
            }
            if params.min_returned_tokens == U256::ZERO {
                doubts.push(
                    TransactionDoubt::warning("no minimum on returned tokens")
                        .on("minReturnedTokens")
                        .with_note("the payment has no slippage protection"),
                );
            }
        }
        OperationParams::CashOut(params) => {
            if params.beneficiary == Address::ZERO {
                doubts.push(
                    TransactionDoubt::critical("beneficiary is the zero address")
                        .on("beneficiary"),
                );
            }
            if params.cash_out_count == U256::ZERO {
                doubts.push(TransactionDoubt::warning("cash-out count is zero").on("cashOutCount"));
            }
            if params.min_tokens_reclaimed == U256::ZERO {
                doubts.push(
                    TransactionDoubt::warning("no minimum on reclaimed tokens")
                        .on("minTokensReclaimed"),
                );
            }
        }
        OperationParams::UseAllowance(params) => {
            if params.beneficiary == Address::ZERO {
                doubts.push(
                    TransactionDoubt::critical("beneficiary is the zero address")
                        .on("beneficiary"),
                );
            }
            if params.amount == U256::ZERO {
                doubts.push(TransactionDoubt::warning("payout amount is zero").on("amount"));
            }
        }
        OperationParams::QueueRuleset(params) => {
            check_rulesets(&params.configs, doubts);
        }
        OperationParams::LaunchProject(params) => {
            if params.owner == Address::ZERO {
                doubts.push(TransactionDoubt::critical("owner is the zero address").on("owner"));
            }
            check_rulesets(&params.configs, doubts);
        }
        OperationParams::DeployRevnet(params) => {
            if params.owner == Address::ZERO {
                doubts.push(TransactionDoubt::critical("owner is the zero address").on("owner"));
            }
            check_rulesets(&params.configs, doubts);
        }
        OperationParams::DeploySuckers(_) => {}
        OperationParams::AdjustTiers(params) => {
            for (idx, tier) in params.tiers_to_add.iter().enumerate() {
                if tier.initialSupply == 0 {
                    doubts.push(
                        TransactionDoubt::critical(format!("tier {idx} has zero initial supply"))
                            .on("tiersToAdd"),
                    );
                }
                if tier.price == alloy::primitives::aliases::U104::ZERO {
                    doubts.push(
                        TransactionDoubt::warning(format!("tier {idx} is free to mint"))
                            .on("tiersToAdd"),
                    );
                }
            }
        }
    }
}

fn check_rulesets(configs: &[RulesetConfig], doubts: &mut Vec<TransactionDoubt>) {
    for (idx, config) in configs.iter().enumerate() {
        if config.reservedPercent > MAX_FEE_PERCENT {
            doubts.push(
                TransactionDoubt::critical(format!(
                    "ruleset {idx} reserves more than 100% of issuance"
                ))
                .on("reservedPercent"),
            );
        }
        if config.weightCutPercent > MAX_FEE_PERCENT {
            doubts.push(
                TransactionDoubt::critical(format!("ruleset {idx} cuts weight by more than 100%"))
                    .on("weightCutPercent"),
            );
        }
        if config.cashOutTaxRate > MAX_FEE_PERCENT {
            doubts.push(
                TransactionDoubt::critical(format!("ruleset {idx} taxes cash-outs above 100%"))
                    .on("cashOutTaxRate"),
            );
        }
        for group in &config.splitGroups {
            let total: u64 = group.splits.iter().map(|split| split.percent as u64).sum();
            if total > SPLITS_TOTAL_PERCENT as u64 {
                doubts.push(
                    TransactionDoubt::critical(format!(
                        "ruleset {idx} split group {} sums to more than 100%",
                        group.groupId
                    ))
                    .on("splitGroups"),
                );
            }
            for split in &group.splits {
                if split.beneficiary == Address::ZERO && split.projectId == 0 {
                    doubts.push(
                        TransactionDoubt::warning(format!(
                            "ruleset {idx} has a split routed to the zero address"
                        ))
                        .on("splitGroups"),
                    );
                }
            }
        }
    }
}

fn check_balances(
    request: &OperationRequest,
    ctx: &VerificationContext,
    doubts: &mut Vec<TransactionDoubt>,
) {
    let native_needed = request.params.native_value();
    if native_needed > U256::ZERO {
        for chain_id in &request.chains {
            if let Some(balance) = ctx.native_balances.get(chain_id)
                && *balance < native_needed
            {
                doubts.push(
                    TransactionDoubt::critical(format!(
                        "insufficient native balance on chain {chain_id}"
                    ))
                    .on("amount")
                    .with_note(format!("need {native_needed}, have {balance}")),
                );
            }
        }
    }
    if let Some((token, amount)) = request.params.erc20_spend() {
        for chain_id in &request.chains {
            if let Some(balance) = ctx.erc20_balances.get(&(*chain_id, token))
                && *balance < amount
            {
                doubts.push(
                    TransactionDoubt::critical(format!(
                        "insufficient token balance on chain {chain_id}"
                    ))
                    .on("amount")
                    .with_note(format!("need {amount}, have {balance}")),
                );
            }
        }
    }
}

fn check_activation(
    request: &OperationRequest,
    ctx: &VerificationContext,
    doubts: &mut Vec<TransactionDoubt>,
) {
    if let (Some(activation), Some(now)) = (request.activation, ctx.now)
        && activation < now
    {
        doubts.push(
            TransactionDoubt::warning("synchronized activation timestamp is in the past")
                .on("activation"),
        );
    }
}

fn check_memo(request: &OperationRequest, doubts: &mut Vec<TransactionDoubt>) {
    if let Some(memo) = &request.memo
        && memo.len() > MEMO_WARN_LEN
    {
        doubts.push(TransactionDoubt::warning("memo is unusually long").on("memo"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NATIVE_TOKEN;
    use crate::types::{BundlingPreference, PayParams, QueueRulesetParams};
    use crate::types::contracts::{Split, SplitGroup};
    use alloy::primitives::address;

    fn pay_request(beneficiary: Address, amount: U256) -> OperationRequest {
        OperationRequest {
            params: OperationParams::Pay(PayParams {
                token: NATIVE_TOKEN,
                amount,
                beneficiary,
                min_returned_tokens: U256::from(1u64),
                fee: None,
            }),
            chains: vec![1],
            project_ids: [(1, 7u64)].into_iter().collect(),
            activation: None,
            memo: None,
            bundling: BundlingPreference::Preferred,
        }
    }

    #[test]
    fn identical_inputs_yield_identical_doubts() {
        let request = pay_request(Address::ZERO, U256::ZERO);
        let ctx = VerificationContext::default();
        assert_eq!(verify(&request, &ctx), verify(&request, &ctx));
    }

    #[test]
    fn critical_doubts_precede_warnings() {
        let request = pay_request(Address::ZERO, U256::ZERO);
        let doubts = verify(&request, &VerificationContext::default());
        assert!(!doubts.is_empty());
        let first_warning =
            doubts.iter().position(|d| d.severity == DoubtSeverity::Warning).unwrap();
        assert!(
            doubts[..first_warning].iter().all(|d| d.severity == DoubtSeverity::Critical),
            "warnings interleaved with criticals: {doubts:?}"
        );
        assert!(doubts[first_warning..].iter().all(|d| d.severity == DoubtSeverity::Warning));
    }

    #[test]
    fn zero_beneficiary_is_critical() {
        let request = pay_request(Address::ZERO, U256::from(100u64));
        let doubts = verify(&request, &VerificationContext::default());
        assert!(doubts.iter().any(|d| {
            d.severity == DoubtSeverity::Critical && d.field == Some("beneficiary")
        }));
    }

    #[test]
    fn overcommitted_splits_are_critical() {
        let config = RulesetConfig {
            splitGroups: vec![SplitGroup {
                groupId: U256::from(1u64),
                splits: vec![
                    Split {
                        percent: SPLITS_TOTAL_PERCENT,
                        beneficiary: address!("0x00000000000000000000000000000000000000a1"),
                        ..Default::default()
                    },
                    Split {
                        percent: 1,
                        beneficiary: address!("0x00000000000000000000000000000000000000a2"),
                        ..Default::default()
                    },
                ],
            }],
            ..Default::default()
        };
        let request = OperationRequest {
            params: OperationParams::QueueRuleset(QueueRulesetParams { configs: vec![config] }),
            chains: vec![1],
            project_ids: [(1, 7u64)].into_iter().collect(),
            activation: None,
            memo: None,
            bundling: BundlingPreference::Preferred,
        };
        let doubts = verify(&request, &VerificationContext::default());
        assert!(doubts.iter().any(|d| {
            d.severity == DoubtSeverity::Critical && d.message.contains("more than 100%")
        }));
    }

    #[test]
    fn insufficient_native_balance_is_critical() {
        let request = pay_request(
            address!("0x00000000000000000000000000000000000000a1"),
            U256::from(10u64).pow(U256::from(18u64)),
        );
        let ctx = VerificationContext {
            native_balances: [(1, U256::from(5u64))].into_iter().collect(),
            ..Default::default()
        };
        let doubts = verify(&request, &ctx);
        assert!(doubts.iter().any(|d| {
            d.severity == DoubtSeverity::Critical && d.message.contains("insufficient native")
        }));
    }

    #[test]
    fn unknown_balance_produces_no_doubt() {
        let request = pay_request(
            address!("0x00000000000000000000000000000000000000a1"),
            U256::from(100u64),
        );
        let doubts = verify(&request, &VerificationContext::default());
        assert!(!doubts.iter().any(|d| d.message.contains("insufficient")));
    }

    #[test]
    fn duplicate_chains_are_critical() {
        let mut request = pay_request(
            address!("0x00000000000000000000000000000000000000a1"),
            U256::from(100u64),
        );
        request.chains = vec![1, 10, 1];
        let doubts = verify(&request, &VerificationContext::default());
        assert!(doubts.iter().any(|d| d.message.contains("targeted more than once")));
    }
}
