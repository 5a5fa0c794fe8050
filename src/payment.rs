//! Payment chain selection.
//!
//! Among the chains offering to cover a bundle's aggregate gas, the selector
//! orders affordable options first, cheapest first. Selection is advisory
//! until the caller (or the default-selection rule) commits a choice.

use crate::types::PaymentOption;
use alloy::primitives::{ChainId, U256};
use std::collections::HashMap;

/// A payment option annotated with affordability.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Deref)]
pub struct RankedOption {
    /// The relay's offer.
    #[deref]
    pub option: PaymentOption,
    /// Whether the user's known balance on that chain covers the required
    /// amount. Unknown balances count as unaffordable.
    pub affordable: bool,
}

/// Ranks payment options: affordable first, then ascending required amount.
///
/// The sort is stable, so options with equal keys keep the relay's original
/// order.
pub fn rank_options(
    options: &[PaymentOption],
    balances: &HashMap<ChainId, U256>,
) -> Vec<RankedOption> {
    let mut ranked: Vec<RankedOption> = options
        .iter()
        .map(|option| RankedOption {
            affordable: balances
                .get(&option.chain_id)
                .is_some_and(|balance| *balance >= option.amount),
            option: option.clone(),
        })
        .collect();
    ranked.sort_by_key(|entry| (!entry.affordable, entry.option.amount));
    ranked
}

/// Returns the default selection, when one is unambiguous.
///
/// Exactly one affordable option selects itself; anything else waits for the
/// caller.
pub fn default_selection(ranked: &[RankedOption]) -> Option<ChainId> {
    let mut affordable = ranked.iter().filter(|entry| entry.affordable);
    let first = affordable.next()?;
    if affordable.next().is_some() { None } else { Some(first.option.chain_id) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(chain_id: ChainId, amount: u64) -> PaymentOption {
        PaymentOption { chain_id, amount: U256::from(amount) }
    }

    #[test]
    fn affordable_options_come_first() {
        let options = [option(1, 100), option(10, 5), option(8453, 50)];
        let balances = [(10, U256::from(10u64)), (8453, U256::from(60u64))].into_iter().collect();
        let ranked = rank_options(&options, &balances);
        assert_eq!(
            ranked.iter().map(|r| r.option.chain_id).collect::<Vec<_>>(),
            vec![10, 8453, 1]
        );
        assert!(ranked[0].affordable && ranked[1].affordable && !ranked[2].affordable);
    }

    #[test]
    fn equal_keys_preserve_relay_order() {
        let options = [option(1, 50), option(10, 50), option(8453, 50)];
        let balances = [
            (1, U256::from(100u64)),
            (10, U256::from(100u64)),
            (8453, U256::from(100u64)),
        ]
        .into_iter()
        .collect();
        let ranked = rank_options(&options, &balances);
        assert_eq!(
            ranked.iter().map(|r| r.option.chain_id).collect::<Vec<_>>(),
            vec![1, 10, 8453]
        );
    }

    #[test]
    fn unknown_balance_is_unaffordable() {
        let ranked = rank_options(&[option(1, 1)], &HashMap::new());
        assert!(!ranked[0].affordable);
    }

    #[test]
    fn single_affordable_option_selects_itself() {
        let options = [option(1, 100), option(10, 5)];
        let balances = [(10, U256::from(10u64))].into_iter().collect();
        let ranked = rank_options(&options, &balances);
        assert_eq!(default_selection(&ranked), Some(10));
    }

    #[test]
    fn ambiguous_options_wait_for_the_caller() {
        let options = [option(1, 5), option(10, 5)];
        let balances =
            [(1, U256::from(10u64)), (10, U256::from(10u64))].into_iter().collect();
        let ranked = rank_options(&options, &balances);
        assert_eq!(default_selection(&ranked), None);
        assert_eq!(default_selection(&[]), None);
    }
}
