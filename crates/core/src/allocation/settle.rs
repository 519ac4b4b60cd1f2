//! Creating allocations inside a unit of work.
//!
//! Both helpers run the oldest-first waterfall over the current balance of a
//! loaded scope and record one [`Allocation`] per share, owned by the given
//! transaction.

use clubledger_shared::types::{Amount, ReceiptId};

use super::strategy::{AllocationPolicy, Claim};
use crate::ledger::{LedgerError, LedgerScope, LedgerTransaction, LedgerWorkspace};
use crate::receipt::Allocation;

/// Applies `credit_id` to the scope's pending debits, oldest first, up to `limit`.
///
/// Returns the amount applied. The credit keeps whatever is not applied as
/// available credit.
pub fn settle_debits_with_credit(
    workspace: &mut LedgerWorkspace,
    scope: LedgerScope,
    credit_id: ReceiptId,
    limit: Amount,
    txn: &mut LedgerTransaction,
) -> Result<Amount, LedgerError> {
    let balance = workspace.balance(scope)?;
    let available = balance
        .unconsumed_credits
        .iter()
        .find(|c| c.receipt_id == credit_id)
        .map_or(Amount::ZERO, |c| c.available);

    let claims = balance
        .pending_debits
        .iter()
        .map(|d| Claim::new(d.receipt_id, d.remaining, Some(d.created_at)))
        .collect();
    let plan = AllocationPolicy::OldestFirst.plan(limit.min(available), claims);

    let now = workspace.now();
    for share in &plan.shares {
        let allocation = Allocation::new(scope, share.key, credit_id, share.amount, txn.id, now);
        txn.own_allocation(workspace.add_allocation(allocation)?);
    }
    Ok(plan.allocated)
}

/// Draws the scope's unconsumed credits, oldest first, into `debit_id`, up to `limit`.
///
/// Returns the amount applied and the credits drawn from.
pub fn fund_debit_from_credits(
    workspace: &mut LedgerWorkspace,
    scope: LedgerScope,
    debit_id: ReceiptId,
    limit: Amount,
    txn: &mut LedgerTransaction,
) -> Result<(Amount, Vec<ReceiptId>), LedgerError> {
    let balance = workspace.balance(scope)?;
    let needed = balance.remaining_on(debit_id);

    let claims = balance
        .unconsumed_credits
        .iter()
        .map(|c| Claim::new(c.receipt_id, c.available, Some(c.created_at)))
        .collect();
    let plan = AllocationPolicy::OldestFirst.plan(limit.min(needed), claims);

    let now = workspace.now();
    let mut drawn_from = Vec::with_capacity(plan.shares.len());
    for share in &plan.shares {
        let allocation = Allocation::new(scope, debit_id, share.key, share.amount, txn.id, now);
        txn.own_allocation(workspace.add_allocation(allocation)?);
        drawn_from.push(share.key);
    }
    Ok((plan.allocated, drawn_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{PayerLedger, TransactionKind};
    use crate::receipt::Receipt;
    use chrono::{Duration, TimeZone, Utc};
    use clubledger_shared::types::{OrganizationId, PayerId, TransactionId};

    fn setup(receipts: Vec<Receipt>, scope: LedgerScope) -> LedgerWorkspace {
        let mut ledger = PayerLedger::empty(scope);
        ledger.receipts = receipts;
        let mut ws = LedgerWorkspace::new(scope.organization_id, Utc::now());
        ws.insert_ledger(ledger).unwrap();
        ws
    }

    fn internal(scope: LedgerScope) -> LedgerTransaction {
        LedgerTransaction::new(TransactionKind::Internal, scope.organization_id, Amount::ZERO, Utc::now())
    }

    #[test]
    fn test_settle_pays_oldest_debit_first() {
        let scope = LedgerScope::new(PayerId::new(), OrganizationId::new());
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let older = Receipt::debit(scope, Amount::from_minor(40), TransactionId::new(), base);
        let newer = Receipt::debit(scope, Amount::from_minor(40), TransactionId::new(), base + Duration::days(3));
        let credit = Receipt::credit(scope, Amount::from_minor(60), TransactionId::new(), base + Duration::days(5));
        let (older_id, newer_id, credit_id) = (older.id, newer.id, credit.id);
        let mut ws = setup(vec![newer, older, credit], scope);
        let mut txn = internal(scope);

        let applied =
            settle_debits_with_credit(&mut ws, scope, credit_id, Amount::from_minor(60), &mut txn).unwrap();

        assert_eq!(applied, Amount::from_minor(60));
        let balance = ws.balance(scope).unwrap();
        assert_eq!(balance.remaining_on(older_id), Amount::ZERO);
        assert_eq!(balance.remaining_on(newer_id), Amount::from_minor(20));
        assert_eq!(txn.allocation_ids.len(), 2);
    }

    #[test]
    fn test_fund_debit_draws_oldest_credit_first() {
        let scope = LedgerScope::new(PayerId::new(), OrganizationId::new());
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let first = Receipt::credit(scope, Amount::from_minor(30), TransactionId::new(), base);
        let second = Receipt::credit(scope, Amount::from_minor(50), TransactionId::new(), base + Duration::days(1));
        let debit = Receipt::debit(scope, Amount::from_minor(50), TransactionId::new(), base + Duration::days(2));
        let (first_id, second_id, debit_id) = (first.id, second.id, debit.id);
        let mut ws = setup(vec![second, first, debit], scope);
        let mut txn = internal(scope);

        let (applied, drawn) =
            fund_debit_from_credits(&mut ws, scope, debit_id, Amount::MAX, &mut txn).unwrap();

        assert_eq!(applied, Amount::from_minor(50));
        assert_eq!(drawn, vec![first_id, second_id]);
        let balance = ws.balance(scope).unwrap();
        assert_eq!(balance.available_credits, Amount::from_minor(30));
        assert_eq!(balance.net_balance, Amount::ZERO);
    }
}
