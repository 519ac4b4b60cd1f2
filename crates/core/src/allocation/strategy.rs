//! Waterfall allocation policies.
//!
//! A waterfall assigns an amount to claims in a priority order, filling each
//! claim completely before moving to the next, until the amount runs out.
//! Whatever is left over is returned as the plan's remainder.
//!
//! Two orders are in use:
//! - `OldestFirst`: chronological, used when settling a payer's own debits
//!   and when drawing credits to fund a debit
//! - `LargestBalanceFirst`: largest claim first, used when spreading a
//!   guardian's lump payment across linked payees

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use clubledger_shared::types::Amount;

/// Order in which claims are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Oldest claim first; ties by key. Claims without a date go last.
    OldestFirst,
    /// Largest outstanding claim first; ties by key.
    LargestBalanceFirst,
}

/// Something an amount can be allocated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim<K> {
    /// Identifies the claim (a receipt id, a payer id, ...).
    pub key: K,
    /// How much the claim can absorb.
    pub outstanding: Amount,
    /// When the claim arose.
    pub since: Option<DateTime<Utc>>,
}

impl<K> Claim<K> {
    /// Creates a claim.
    pub fn new(key: K, outstanding: Amount, since: Option<DateTime<Utc>>) -> Self {
        Self {
            key,
            outstanding,
            since,
        }
    }
}

/// The part of the amount assigned to one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationShare<K> {
    /// The claim served.
    pub key: K,
    /// Amount assigned, strictly positive.
    pub amount: Amount,
    /// What the claim still needs afterwards.
    pub remaining_after: Amount,
}

/// Result of running a waterfall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan<K> {
    /// Shares in the order they were served.
    pub shares: Vec<AllocationShare<K>>,
    /// Sum of all shares.
    pub allocated: Amount,
    /// Amount left after every claim was served.
    pub remainder: Amount,
}

impl AllocationPolicy {
    /// Orders the claims in place according to the policy.
    pub fn order<K: Ord + Copy>(self, claims: &mut [Claim<K>]) {
        match self {
            Self::OldestFirst => claims.sort_by_key(|c| (c.since.is_none(), c.since, c.key)),
            Self::LargestBalanceFirst => claims.sort_by_key(|c| (Reverse(c.outstanding), c.key)),
        }
    }

    /// Runs the waterfall.
    ///
    /// Claims with nothing outstanding are skipped. The sum of the shares plus
    /// the remainder always equals `amount`; a non-positive `amount` yields an
    /// empty plan with a zero remainder.
    ///
    /// # Example
    ///
    /// ```
    /// use clubledger_core::allocation::{AllocationPolicy, Claim};
    /// use clubledger_shared::types::Amount;
    ///
    /// let claims = vec![
    ///     Claim::new('a', Amount::from_minor(50), None),
    ///     Claim::new('b', Amount::from_minor(30), None),
    /// ];
    /// let plan = AllocationPolicy::LargestBalanceFirst.plan(Amount::from_minor(70), claims);
    /// assert_eq!(plan.shares[0].amount, Amount::from_minor(50));
    /// assert_eq!(plan.shares[1].remaining_after, Amount::from_minor(10));
    /// assert_eq!(plan.remainder, Amount::ZERO);
    /// ```
    #[must_use]
    pub fn plan<K: Ord + Copy>(self, amount: Amount, mut claims: Vec<Claim<K>>) -> AllocationPlan<K> {
        let amount = if amount.is_positive() { amount } else { Amount::ZERO };
        claims.retain(|c| c.outstanding.is_positive());
        self.order(&mut claims);

        let mut remaining = amount;
        let mut shares = Vec::new();
        for claim in claims {
            if remaining.is_zero() {
                break;
            }
            let share = remaining.min(claim.outstanding);
            remaining = remaining - share;
            shares.push(AllocationShare {
                key: claim.key,
                amount: share,
                remaining_after: claim.outstanding - share,
            });
        }

        AllocationPlan {
            shares,
            allocated: amount - remaining,
            remainder: remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn at(day: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(day))
    }

    fn amounts(plan: &AllocationPlan<u32>) -> Vec<(u32, i64)> {
        plan.shares.iter().map(|s| (s.key, s.amount.minor())).collect()
    }

    #[rstest]
    #[case::exact(80, vec![(1, 50), (2, 30)], 0)]
    #[case::short(70, vec![(1, 50), (2, 20)], 0)]
    #[case::excess(100, vec![(1, 50), (2, 30)], 20)]
    #[case::tiny(10, vec![(1, 10)], 0)]
    fn test_largest_balance_first(
        #[case] amount: i64,
        #[case] expected: Vec<(u32, i64)>,
        #[case] remainder: i64,
    ) {
        let claims = vec![
            Claim::new(2, Amount::from_minor(30), at(0)),
            Claim::new(1, Amount::from_minor(50), at(5)),
        ];
        let plan = AllocationPolicy::LargestBalanceFirst.plan(Amount::from_minor(amount), claims);
        assert_eq!(amounts(&plan), expected);
        assert_eq!(plan.remainder, Amount::from_minor(remainder));
    }

    #[test]
    fn test_oldest_first_ignores_size() {
        let claims = vec![
            Claim::new(1, Amount::from_minor(50), at(5)),
            Claim::new(2, Amount::from_minor(30), at(0)),
        ];
        let plan = AllocationPolicy::OldestFirst.plan(Amount::from_minor(40), claims);
        assert_eq!(amounts(&plan), vec![(2, 30), (1, 10)]);
        assert_eq!(plan.shares[1].remaining_after, Amount::from_minor(40));
    }

    #[test]
    fn test_oldest_first_puts_undated_claims_last() {
        let claims = vec![
            Claim::new(1, Amount::from_minor(10), None),
            Claim::new(2, Amount::from_minor(10), at(3)),
        ];
        let plan = AllocationPolicy::OldestFirst.plan(Amount::from_minor(15), claims);
        assert_eq!(amounts(&plan), vec![(2, 10), (1, 5)]);
    }

    #[test]
    fn test_ties_broken_by_key() {
        let claims = vec![
            Claim::new(9, Amount::from_minor(10), at(1)),
            Claim::new(3, Amount::from_minor(10), at(1)),
        ];
        let oldest = AllocationPolicy::OldestFirst.plan(Amount::from_minor(10), claims.clone());
        let largest = AllocationPolicy::LargestBalanceFirst.plan(Amount::from_minor(10), claims);
        assert_eq!(amounts(&oldest), vec![(3, 10)]);
        assert_eq!(amounts(&largest), vec![(3, 10)]);
    }

    #[test]
    fn test_zero_claims_and_zero_amount() {
        let claims = vec![Claim::new(1, Amount::ZERO, at(0))];
        let plan = AllocationPolicy::OldestFirst.plan(Amount::from_minor(25), claims);
        assert!(plan.shares.is_empty());
        assert_eq!(plan.remainder, Amount::from_minor(25));

        let plan = AllocationPolicy::OldestFirst.plan(
            Amount::ZERO,
            vec![Claim::new(1, Amount::from_minor(5), None)],
        );
        assert!(plan.shares.is_empty());
        assert_eq!(plan.remainder, Amount::ZERO);
    }
}
