//! One guardian lump payment spread across linked payees, largest debtor first.

use serde::Serialize;

use clubledger_shared::types::{
    AcademyId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::allocation::{settle_debits_with_credit, AllocationPolicy, Claim};
use crate::ledger::{
    LedgerError, LedgerScope, LedgerTransaction, LedgerWorkspace, PayeePayment, PaymentMethod,
    TransactionKind,
};
use crate::receipt::Receipt;

/// A guardian payment to spread across linked payees.
#[derive(Debug, Clone)]
pub struct GuardianPaymentRequest {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The paying guardian.
    pub guardian_id: PayerId,
    /// Payees linked to the guardian.
    pub payees: Vec<PayerId>,
    /// Lump amount paid.
    pub amount: Amount,
    /// Academy the receipts are filed under.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Staff member recording the payment.
    pub handled_by: Option<UserId>,
    /// Free-form description.
    pub description: Option<String>,
    /// Client idempotency key.
    pub idempotency_key: Option<String>,
}

/// One payee's share of a guardian payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayeeDistribution {
    /// The payee.
    pub payee_id: PayerId,
    /// Amount paid towards the payee's debt.
    pub amount_paid: Amount,
    /// Net balance the payee still owes.
    pub remaining_balance: Amount,
    /// The payee credit receipt.
    pub receipt_id: ReceiptId,
}

/// Result of a guardian payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardianDistribution {
    /// The income transaction.
    pub transaction_id: TransactionId,
    /// The bookkeeping record of the lump payment on the guardian ledger.
    pub guardian_receipt_id: ReceiptId,
    /// The lump amount.
    pub total_amount: Amount,
    /// Sum paid to payees.
    pub distributed_amount: Amount,
    /// Amount banked as guardian credit.
    pub excess_amount: Amount,
    /// The guardian excess credit receipt, if any.
    pub excess_receipt_id: Option<ReceiptId>,
    /// Per-payee shares, in the order they were served.
    pub distributions: Vec<PayeeDistribution>,
    /// Payees whose net balance reached zero.
    pub players_fully_paid: u32,
}

/// Spreads a lump payment across payees by largest outstanding balance first.
///
/// This order differs from [`super::PaymentDistributor`], which settles
/// debts chronologically. Both orders are kept as separate policies.
pub struct GuardianPaymentDistributor;

impl GuardianPaymentDistributor {
    /// Plans the payment inside a workspace holding the guardian's ledger and
    /// every payee's ledger.
    ///
    /// Payees with a positive net balance are served largest first, each
    /// receiving `min(remaining, net balance)` as a credit applied to their
    /// own pending debits oldest first. The lump itself is recorded on the
    /// guardian as a bookkeeping credit; any remainder becomes a spendable
    /// guardian credit.
    pub fn distribute(
        workspace: &mut LedgerWorkspace,
        request: GuardianPaymentRequest,
    ) -> Result<GuardianDistribution, LedgerError> {
        let amount = Amount::positive(request.amount.minor())?;
        let now = workspace.now();
        let org = request.organization_id;
        let guardian_scope = LedgerScope::new(request.guardian_id, org);

        let mut payees = request.payees.clone();
        payees.sort();
        payees.dedup();
        payees.retain(|p| *p != request.guardian_id);

        let mut claims = Vec::with_capacity(payees.len());
        for payee in &payees {
            let balance = workspace.balance(LedgerScope::new(*payee, org))?;
            claims.push(Claim::new(
                *payee,
                balance.net_balance,
                balance.oldest_pending_since(),
            ));
        }
        let plan = AllocationPolicy::LargestBalanceFirst.plan(amount, claims);

        let mut txn = LedgerTransaction::new(TransactionKind::Income, org, amount, now)
            .with_payer(request.guardian_id)
            .with_handling(request.method, request.handled_by)
            .with_description(request.description.clone())
            .with_idempotency_key(request.idempotency_key);

        let lump = Receipt::credit(guardian_scope, amount, txn.id, now)
            .as_bookkeeping()
            .with_academy(request.academy_id)
            .with_description(request.description.clone());
        let guardian_receipt_id = workspace.add_receipt(lump)?;
        txn.own_receipt(guardian_receipt_id);

        let mut distributions = Vec::with_capacity(plan.shares.len());
        for share in &plan.shares {
            let scope = LedgerScope::new(share.key, org);
            let credit = Receipt::credit(scope, share.amount, txn.id, now)
                .with_academy(request.academy_id)
                .with_description(request.description.clone());
            let receipt_id = workspace.add_receipt(credit)?;
            txn.own_receipt(receipt_id);
            settle_debits_with_credit(workspace, scope, receipt_id, share.amount, &mut txn)?;

            txn.payee_payments.push(PayeePayment {
                payee_id: share.key,
                amount: share.amount,
            });
            distributions.push(PayeeDistribution {
                payee_id: share.key,
                amount_paid: share.amount,
                remaining_balance: workspace.balance(scope)?.net_balance,
                receipt_id,
            });
        }

        let excess_receipt_id = if plan.remainder.is_positive() {
            let excess = Receipt::credit(guardian_scope, plan.remainder, txn.id, now)
                .with_academy(request.academy_id)
                .with_description(request.description.clone());
            let id = workspace.add_receipt(excess)?;
            txn.own_receipt(id);
            Some(id)
        } else {
            None
        };

        let players_fully_paid = distributions
            .iter()
            .filter(|d| d.remaining_balance.is_zero())
            .count();
        let result = GuardianDistribution {
            transaction_id: txn.id,
            guardian_receipt_id,
            total_amount: amount,
            distributed_amount: plan.allocated,
            excess_amount: plan.remainder,
            excess_receipt_id,
            distributions,
            players_fully_paid: u32::try_from(players_fully_paid).unwrap_or(u32::MAX),
        };
        workspace.record_transaction(txn);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PayerLedger;
    use chrono::Utc;
    use rstest::rstest;

    struct Family {
        org: OrganizationId,
        guardian: PayerId,
        a: PayerId,
        b: PayerId,
        ws: LedgerWorkspace,
    }

    fn family(a_owes: i64, b_owes: i64) -> Family {
        let org = OrganizationId::new();
        let (guardian, a, b) = (PayerId::new(), PayerId::new(), PayerId::new());
        let mut ws = LedgerWorkspace::new(org, Utc::now());
        ws.insert_ledger(PayerLedger::empty(LedgerScope::new(guardian, org)))
            .unwrap();
        for (payee, owes) in [(a, a_owes), (b, b_owes)] {
            let scope = LedgerScope::new(payee, org);
            let mut ledger = PayerLedger::empty(scope);
            if owes > 0 {
                ledger.receipts.push(Receipt::debit(
                    scope,
                    Amount::from_minor(owes),
                    TransactionId::new(),
                    Utc::now(),
                ));
            }
            ws.insert_ledger(ledger).unwrap();
        }
        Family { org, guardian, a, b, ws }
    }

    fn request(f: &Family, amount: i64) -> GuardianPaymentRequest {
        GuardianPaymentRequest {
            organization_id: f.org,
            guardian_id: f.guardian,
            payees: vec![f.b, f.a],
            amount: Amount::from_minor(amount),
            academy_id: None,
            method: None,
            handled_by: None,
            description: Some("Family payment".to_string()),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_largest_debtor_paid_first_short_payment() {
        let mut f = family(50, 30);
        let req = request(&f, 70);
        let result = GuardianPaymentDistributor::distribute(&mut f.ws, req).unwrap();

        assert_eq!(result.distributions[0].payee_id, f.a);
        assert_eq!(result.distributions[0].amount_paid, Amount::from_minor(50));
        assert_eq!(result.distributions[0].remaining_balance, Amount::ZERO);
        assert_eq!(result.distributions[1].payee_id, f.b);
        assert_eq!(result.distributions[1].amount_paid, Amount::from_minor(20));
        assert_eq!(result.distributions[1].remaining_balance, Amount::from_minor(10));
        assert_eq!(result.excess_amount, Amount::ZERO);
        assert_eq!(result.excess_receipt_id, None);
        assert_eq!(result.players_fully_paid, 1);
    }

    #[test]
    fn test_excess_banked_on_guardian() {
        let mut f = family(50, 30);
        let req = request(&f, 100);
        let result = GuardianPaymentDistributor::distribute(&mut f.ws, req).unwrap();

        assert_eq!(result.distributed_amount, Amount::from_minor(80));
        assert_eq!(result.excess_amount, Amount::from_minor(20));
        assert_eq!(result.players_fully_paid, 2);

        let guardian = f.ws.balance(LedgerScope::new(f.guardian, f.org)).unwrap();
        assert_eq!(guardian.available_credits, Amount::from_minor(20));

        let changes = f.ws.into_changeset().unwrap();
        assert_eq!(changes.balances.len(), 3);
        assert_eq!(changes.new_receipts.iter().filter(|r| r.bookkeeping).count(), 1);
    }

    #[rstest]
    #[case::nobody_owes(0, 0, 40)]
    #[case::one_owes(25, 0, 15)]
    fn test_unpaid_payees_skipped(#[case] a_owes: i64, #[case] b_owes: i64, #[case] excess: i64) {
        let mut f = family(a_owes, b_owes);
        let req = request(&f, 40);
        let result = GuardianPaymentDistributor::distribute(&mut f.ws, req).unwrap();

        let served = usize::from(a_owes > 0) + usize::from(b_owes > 0);
        assert_eq!(result.distributions.len(), served);
        assert_eq!(result.excess_amount, Amount::from_minor(excess));
        assert!(result.excess_receipt_id.is_some());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut f = family(10, 10);
        let req = request(&f, 0);
        assert!(matches!(
            GuardianPaymentDistributor::distribute(&mut f.ws, req),
            Err(LedgerError::ZeroAmount)
        ));
    }
}
