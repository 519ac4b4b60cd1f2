//! Balance computation over a payer's receipts.
//!
//! `LedgerEngine` is a pure function of the receipts and allocations of one
//! scope: no I/O, no clock, no mutation. The same inputs always produce the
//! same [`BalanceSnapshot`].

use std::collections::HashMap;

use clubledger_shared::types::{Amount, ReceiptId};

use super::types::{BalanceSnapshot, LedgerScope, PendingDebit, UnconsumedCredit};
use crate::receipt::{Allocation, Receipt, ReceiptKind};

/// A receipt whose allocations exceed its own amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inconsistency {
    /// The receipt.
    pub receipt_id: ReceiptId,
    /// Which side is over-allocated.
    pub kind: InconsistencyKind,
    /// The receipt amount.
    pub amount: Amount,
    /// Sum of counted allocations on the receipt.
    pub allocated: Amount,
}

/// Direction of an over-allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InconsistencyKind {
    /// More credit drawn than the credit holds.
    OverdrawnCredit,
    /// More credit applied than the debit owes.
    OverCoveredDebit,
}

/// Pure balance engine.
pub struct LedgerEngine;

impl LedgerEngine {
    /// Computes outstanding debt, available credit and net balance of a scope.
    ///
    /// Only active receipts of `scope` count. Bookkeeping credits are ignored.
    /// An allocation counts when it is active and both of its ends are
    /// counted receipts.
    #[must_use]
    pub fn compute(
        scope: LedgerScope,
        receipts: &[Receipt],
        allocations: &[Allocation],
    ) -> BalanceSnapshot {
        let counted = counted_receipts(scope, receipts);
        let (applied, drawn) = allocation_totals(scope, &counted, allocations);

        let mut ordered: Vec<&Receipt> = counted.values().copied().collect();
        ordered.sort_by_key(|r| (r.created_at, r.id));

        let mut snapshot = BalanceSnapshot::empty(scope);
        for receipt in ordered {
            match receipt.kind {
                ReceiptKind::Debit => {
                    let applied = applied.get(&receipt.id).copied().unwrap_or(Amount::ZERO);
                    let remaining = receipt.amount.saturating_sub_floor(applied);
                    if remaining.is_positive() {
                        snapshot.outstanding_debits = snapshot.outstanding_debits + remaining;
                        snapshot.pending_debits.push(PendingDebit {
                            receipt_id: receipt.id,
                            amount: receipt.amount,
                            applied,
                            remaining,
                            created_at: receipt.created_at,
                        });
                    }
                }
                ReceiptKind::Credit => {
                    let drawn = drawn.get(&receipt.id).copied().unwrap_or(Amount::ZERO);
                    let available = receipt.amount.saturating_sub_floor(drawn);
                    if available.is_positive() {
                        snapshot.available_credits = snapshot.available_credits + available;
                        snapshot.unconsumed_credits.push(UnconsumedCredit {
                            receipt_id: receipt.id,
                            amount: receipt.amount,
                            drawn,
                            available,
                            created_at: receipt.created_at,
                        });
                    }
                }
            }
        }

        snapshot.net_balance = snapshot
            .outstanding_debits
            .saturating_sub_floor(snapshot.available_credits);
        snapshot
    }

    /// Lists receipts whose counted allocations exceed their amount.
    #[must_use]
    pub fn check_consistency(
        scope: LedgerScope,
        receipts: &[Receipt],
        allocations: &[Allocation],
    ) -> Vec<Inconsistency> {
        let counted = counted_receipts(scope, receipts);
        let (applied, drawn) = allocation_totals(scope, &counted, allocations);

        let mut found: Vec<Inconsistency> = counted
            .values()
            .filter_map(|receipt| {
                let (kind, allocated) = match receipt.kind {
                    ReceiptKind::Debit => (InconsistencyKind::OverCoveredDebit, applied.get(&receipt.id)),
                    ReceiptKind::Credit => (InconsistencyKind::OverdrawnCredit, drawn.get(&receipt.id)),
                };
                let allocated = allocated.copied().unwrap_or(Amount::ZERO);
                (allocated > receipt.amount).then_some(Inconsistency {
                    receipt_id: receipt.id,
                    kind,
                    amount: receipt.amount,
                    allocated,
                })
            })
            .collect();
        found.sort_by_key(|i| i.receipt_id);
        found
    }
}

fn counted_receipts(scope: LedgerScope, receipts: &[Receipt]) -> HashMap<ReceiptId, &Receipt> {
    receipts
        .iter()
        .filter(|r| r.scope() == scope && r.is_active() && !r.bookkeeping)
        .map(|r| (r.id, r))
        .collect()
}

type Totals = HashMap<ReceiptId, Amount>;

fn allocation_totals(
    scope: LedgerScope,
    counted: &HashMap<ReceiptId, &Receipt>,
    allocations: &[Allocation],
) -> (Totals, Totals) {
    let mut applied = Totals::new();
    let mut drawn = Totals::new();
    for allocation in allocations {
        if !allocation.is_active() || allocation.scope() != scope {
            continue;
        }
        let ends = (
            counted.get(&allocation.debit_id),
            counted.get(&allocation.credit_id),
        );
        let (Some(debit), Some(credit)) = ends else {
            continue;
        };
        if debit.kind != ReceiptKind::Debit || credit.kind != ReceiptKind::Credit {
            continue;
        }
        let on_debit = applied.entry(allocation.debit_id).or_default();
        *on_debit = *on_debit + allocation.amount;
        let on_credit = drawn.entry(allocation.credit_id).or_default();
        *on_credit = *on_credit + allocation.amount;
    }
    (applied, drawn)
}
