//! Automatic application of unconsumed credit to a new debit.

use serde::Serialize;

use clubledger_shared::types::{AllocationId, Amount, ReceiptId, TransactionId, UserId};

use crate::allocation::fund_debit_from_credits;
use crate::ledger::{LedgerError, LedgerScope, LedgerTransaction, LedgerWorkspace, TransactionKind};

/// Outcome of applying credit to a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditApplication {
    /// The internal audit transaction owning the allocations.
    pub transaction_id: TransactionId,
    /// The debit that received credit.
    pub debit_id: ReceiptId,
    /// Amount applied.
    pub applied: Amount,
    /// Credits drawn from, oldest first.
    pub credits_drawn: Vec<ReceiptId>,
    /// Allocations created.
    pub allocation_ids: Vec<AllocationId>,
    /// Credit still available to the payer afterwards.
    pub available_after: Amount,
}

/// Consumes a payer's unconsumed credit, oldest first, into one debit.
pub struct CreditApplicator;

impl CreditApplicator {
    /// Applies `min(available credit, debit remainder)` to the debit.
    ///
    /// Returns `None` when there is no credit to apply or the debit is already
    /// settled. Otherwise a system-generated `internal` transaction is recorded
    /// in the workspace, owning every allocation it created.
    pub fn apply(
        workspace: &mut LedgerWorkspace,
        scope: LedgerScope,
        debit_id: ReceiptId,
        handled_by: Option<UserId>,
    ) -> Result<Option<CreditApplication>, LedgerError> {
        let is_open_debit = workspace
            .ledger(scope)?
            .receipt(debit_id)
            .is_some_and(crate::receipt::Receipt::is_open_debit);
        if !is_open_debit {
            return Err(LedgerError::NotADebit(debit_id));
        }

        let balance = workspace.balance(scope)?;
        let to_apply = balance.available_credits.min(balance.remaining_on(debit_id));
        if !to_apply.is_positive() {
            return Ok(None);
        }

        let mut txn = LedgerTransaction::new(
            TransactionKind::Internal,
            scope.organization_id,
            to_apply,
            workspace.now(),
        )
        .with_payer(scope.payer_id)
        .with_handling(None, handled_by)
        .with_description(Some("Automatic credit application".to_string()));

        let (applied, credits_drawn) =
            fund_debit_from_credits(workspace, scope, debit_id, to_apply, &mut txn)?;
        txn.amount = applied;

        let application = CreditApplication {
            transaction_id: txn.id,
            debit_id,
            applied,
            credits_drawn,
            allocation_ids: txn.allocation_ids.clone(),
            available_after: workspace.balance(scope)?.available_credits,
        };
        workspace.record_transaction(txn);
        Ok(Some(application))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PayerLedger;
    use crate::receipt::Receipt;
    use chrono::{Duration, TimeZone, Utc};
    use clubledger_shared::types::{OrganizationId, PayerId};

    fn workspace_with(receipts: Vec<Receipt>, scope: LedgerScope) -> LedgerWorkspace {
        let mut ledger = PayerLedger::empty(scope);
        ledger.receipts = receipts;
        let mut ws = LedgerWorkspace::new(scope.organization_id, Utc::now());
        ws.insert_ledger(ledger).unwrap();
        ws
    }

    fn scope() -> LedgerScope {
        LedgerScope::new(PayerId::new(), OrganizationId::new())
    }

    #[test]
    fn test_no_credit_is_a_no_op() {
        let s = scope();
        let debit = Receipt::debit(s, Amount::from_minor(100), TransactionId::new(), Utc::now());
        let id = debit.id;
        let mut ws = workspace_with(vec![debit], s);

        assert!(CreditApplicator::apply(&mut ws, s, id, None).unwrap().is_none());
        assert!(ws.into_changeset().unwrap().new_transactions.is_empty());
    }

    #[test]
    fn test_partial_credit_leaves_remainder_on_debit() {
        let s = scope();
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let credit = Receipt::credit(s, Amount::from_minor(40), TransactionId::new(), base);
        let debit = Receipt::debit(s, Amount::from_minor(100), TransactionId::new(), base + Duration::hours(1));
        let id = debit.id;
        let mut ws = workspace_with(vec![credit, debit], s);

        let outcome = CreditApplicator::apply(&mut ws, s, id, None).unwrap().unwrap();

        assert_eq!(outcome.applied, Amount::from_minor(40));
        assert_eq!(outcome.available_after, Amount::ZERO);
        let balance = ws.balance(s).unwrap();
        assert_eq!(balance.remaining_on(id), Amount::from_minor(60));
        assert_eq!(balance.net_balance, Amount::from_minor(60));

        let changes = ws.into_changeset().unwrap();
        assert_eq!(changes.new_transactions[0].kind, TransactionKind::Internal);
        assert_eq!(changes.new_transactions[0].amount, Amount::from_minor(40));
    }

    #[test]
    fn test_larger_credit_is_partially_consumed() {
        let s = scope();
        let credit = Receipt::credit(s, Amount::from_minor(80), TransactionId::new(), Utc::now());
        let debit = Receipt::debit(s, Amount::from_minor(50), TransactionId::new(), Utc::now());
        let id = debit.id;
        let mut ws = workspace_with(vec![credit, debit], s);

        let outcome = CreditApplicator::apply(&mut ws, s, id, None).unwrap().unwrap();

        assert_eq!(outcome.applied, Amount::from_minor(50));
        assert_eq!(outcome.available_after, Amount::from_minor(30));
        assert_eq!(ws.balance(s).unwrap().net_balance, Amount::ZERO);
    }

    #[test]
    fn test_rejects_credit_receipt_as_target() {
        let s = scope();
        let credit = Receipt::credit(s, Amount::from_minor(80), TransactionId::new(), Utc::now());
        let id = credit.id;
        let mut ws = workspace_with(vec![credit], s);

        assert!(matches!(
            CreditApplicator::apply(&mut ws, s, id, None),
            Err(LedgerError::NotADebit(_))
        ));
    }
}
