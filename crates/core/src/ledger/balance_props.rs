//! Property-based tests for LedgerEngine.
//!
//! - Property 1: outstanding debits equal the sum of debit remainders
//! - Property 2: available credit equals the sum of unconsumed credit
//! - Property 3: net balance is outstanding minus available, floored at zero
//! - Property 4: computation is idempotent

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use clubledger_shared::types::{Amount, OrganizationId, PayerId, TransactionId, UserId};

use super::balance::LedgerEngine;
use super::types::LedgerScope;
use crate::receipt::{Allocation, AllocationStatus, Receipt};

/// Strategy for receipt amounts in minor units.
fn minor_amount() -> impl Strategy<Value = i64> {
    1i64..1_000_000i64
}

/// A generated ledger: receipts plus allocations between them.
#[derive(Debug, Clone)]
struct GeneratedLedger {
    scope: LedgerScope,
    receipts: Vec<Receipt>,
    allocations: Vec<Allocation>,
}

/// Strategy for a ledger with random debits, credits, deletions and links.
///
/// Links may over-allocate; the engine floors every remainder at zero.
fn ledger_strategy() -> impl Strategy<Value = GeneratedLedger> {
    (
        prop::collection::vec((minor_amount(), any::<bool>()), 0..8),
        prop::collection::vec((minor_amount(), any::<bool>()), 0..8),
        prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), minor_amount(), any::<bool>()), 0..12),
    )
        .prop_map(|(debits, credits, links)| {
            let scope = LedgerScope::new(PayerId::new(), OrganizationId::new());
            let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let actor = UserId::new();
            let mut minute = 0;
            let mut stamp = || {
                minute += 1;
                base + Duration::minutes(minute)
            };

            let debit_receipts: Vec<Receipt> = debits
                .into_iter()
                .map(|(amount, deleted)| {
                    let mut r = Receipt::debit(scope, Amount::from_minor(amount), TransactionId::new(), stamp());
                    if deleted {
                        r.mark_deleted(actor, base);
                    }
                    r
                })
                .collect();
            let credit_receipts: Vec<Receipt> = credits
                .into_iter()
                .map(|(amount, deleted)| {
                    let mut r = Receipt::credit(scope, Amount::from_minor(amount), TransactionId::new(), stamp());
                    if deleted {
                        r.mark_deleted(actor, base);
                    }
                    r
                })
                .collect();

            let mut allocations = Vec::new();
            if !debit_receipts.is_empty() && !credit_receipts.is_empty() {
                for (d, c, amount, removed) in links {
                    let mut a = Allocation::new(
                        scope,
                        d.get(&debit_receipts).id,
                        c.get(&credit_receipts).id,
                        Amount::from_minor(amount),
                        TransactionId::new(),
                        base,
                    );
                    if removed {
                        a.status = AllocationStatus::Removed;
                    }
                    allocations.push(a);
                }
            }

            let mut receipts = debit_receipts;
            receipts.extend(credit_receipts);
            GeneratedLedger {
                scope,
                receipts,
                allocations,
            }
        })
}

/// Sum of active allocation amounts landing on a receipt through active ends.
fn linked_total(ledger: &GeneratedLedger, pick: impl Fn(&Allocation) -> bool) -> Amount {
    ledger
        .allocations
        .iter()
        .filter(|a| a.is_active())
        .filter(|a| {
            let debit_active = ledger.receipts.iter().any(|r| r.id == a.debit_id && r.is_active());
            let credit_active = ledger.receipts.iter().any(|r| r.id == a.credit_id && r.is_active());
            debit_active && credit_active
        })
        .filter(|a| pick(a))
        .map(|a| a.amount)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: outstanding = Σ over active debits of max(0, amount − linked credit).
    #[test]
    fn prop_outstanding_is_sum_of_debit_remainders(ledger in ledger_strategy()) {
        let balance = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);

        let expected: Amount = ledger
            .receipts
            .iter()
            .filter(|r| r.is_open_debit())
            .map(|r| r.amount.saturating_sub_floor(linked_total(&ledger, |a| a.debit_id == r.id)))
            .sum();

        prop_assert_eq!(balance.outstanding_debits, expected);
    }

    /// Property 2: available = Σ over active credits of max(0, amount − drawn).
    #[test]
    fn prop_available_is_sum_of_unconsumed_credit(ledger in ledger_strategy()) {
        let balance = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);

        let expected: Amount = ledger
            .receipts
            .iter()
            .filter(|r| r.is_spendable_credit())
            .map(|r| r.amount.saturating_sub_floor(linked_total(&ledger, |a| a.credit_id == r.id)))
            .sum();

        prop_assert_eq!(balance.available_credits, expected);
    }

    /// Property 3: net = max(0, outstanding − available).
    #[test]
    fn prop_net_balance_floored_at_zero(ledger in ledger_strategy()) {
        let balance = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);

        let raw = balance.outstanding_debits.minor() - balance.available_credits.minor();
        prop_assert_eq!(balance.net_balance.minor(), raw.max(0));
        prop_assert!(balance.net_balance <= balance.outstanding_debits);
    }

    /// Property 4: repeated computation yields identical results.
    #[test]
    fn prop_compute_is_idempotent(ledger in ledger_strategy()) {
        let first = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);
        let second = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);
        prop_assert_eq!(first, second);
    }
}
