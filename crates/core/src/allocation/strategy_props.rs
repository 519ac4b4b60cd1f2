//! Property-based tests for the waterfall policies.
//!
//! - Property 1: conservation, shares plus remainder equal the amount
//! - Property 2: no claim receives more than it needs
//! - Property 3: only the last served claim may be partially filled
//! - Property 4: a remainder exists only when every claim is filled

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use clubledger_shared::types::Amount;

use super::strategy::{AllocationPolicy, Claim};

fn policy_strategy() -> impl Strategy<Value = AllocationPolicy> {
    prop_oneof![
        Just(AllocationPolicy::OldestFirst),
        Just(AllocationPolicy::LargestBalanceFirst),
    ]
}

/// Claims keyed by index, with outstanding 0..100_000 and optional dates.
fn claims_strategy() -> impl Strategy<Value = Vec<Claim<usize>>> {
    prop::collection::vec((0i64..100_000, prop::option::of(0i64..365)), 0..10).prop_map(|raw| {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        raw.into_iter()
            .enumerate()
            .map(|(i, (outstanding, day))| {
                Claim::new(i, Amount::from_minor(outstanding), day.map(|d| base + Duration::days(d)))
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: Σ shares + remainder = amount.
    #[test]
    fn prop_waterfall_conserves_amount(
        policy in policy_strategy(),
        claims in claims_strategy(),
        amount in 0i64..500_000,
    ) {
        let plan = policy.plan(Amount::from_minor(amount), claims);
        let shared: Amount = plan.shares.iter().map(|s| s.amount).sum();
        prop_assert_eq!(shared, plan.allocated);
        prop_assert_eq!((plan.allocated + plan.remainder).minor(), amount);
    }

    /// Property 2: every share is positive and bounded by its claim.
    #[test]
    fn prop_share_never_exceeds_claim(
        policy in policy_strategy(),
        claims in claims_strategy(),
        amount in 0i64..500_000,
    ) {
        let plan = policy.plan(Amount::from_minor(amount), claims.clone());
        for share in &plan.shares {
            let claim = claims.iter().find(|c| c.key == share.key).unwrap();
            prop_assert!(share.amount.is_positive());
            prop_assert!(share.amount <= claim.outstanding);
            prop_assert_eq!(share.amount + share.remaining_after, claim.outstanding);
        }
    }

    /// Property 3: all shares but the last fill their claim completely.
    #[test]
    fn prop_only_last_share_is_partial(
        policy in policy_strategy(),
        claims in claims_strategy(),
        amount in 0i64..500_000,
    ) {
        let plan = policy.plan(Amount::from_minor(amount), claims);
        if let Some((_, served)) = plan.shares.split_last() {
            for share in served {
                prop_assert!(share.remaining_after.is_zero());
            }
        }
    }

    /// Property 4: a positive remainder means every claim was filled.
    #[test]
    fn prop_remainder_only_after_all_claims_filled(
        policy in policy_strategy(),
        claims in claims_strategy(),
        amount in 0i64..500_000,
    ) {
        let total: Amount = claims.iter().map(|c| c.outstanding).sum();
        let plan = policy.plan(Amount::from_minor(amount), claims);
        if plan.remainder.is_positive() {
            prop_assert_eq!(plan.allocated, total);
        }
    }

    /// Largest-first serves claims in non-increasing size.
    #[test]
    fn prop_largest_first_is_non_increasing(
        claims in claims_strategy(),
        amount in 0i64..500_000,
    ) {
        let plan = AllocationPolicy::LargestBalanceFirst.plan(Amount::from_minor(amount), claims);
        let sizes: Vec<Amount> = plan.shares.iter().map(|s| s.amount + s.remaining_after).collect();
        prop_assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    }
}
