//! Single payer paying into one or more payee ledgers, oldest debt first.

use serde::Serialize;

use clubledger_shared::types::{
    AcademyId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::allocation::settle_debits_with_credit;
use crate::ledger::{
    LedgerError, LedgerScope, LedgerTransaction, LedgerWorkspace, PayeePayment, PaymentMethod,
    TransactionKind,
};
use crate::receipt::Receipt;

/// A payment to distribute.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The payment maker.
    pub payer_id: PayerId,
    /// Per-payee amounts. Zero entries are dropped.
    pub payee_payments: Vec<PayeePayment>,
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

/// What happened to one payee's share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayeeSettlement {
    /// The payee.
    pub payee_id: PayerId,
    /// The credit receipt recording the payment.
    pub receipt_id: ReceiptId,
    /// Amount paid to this payee.
    pub amount: Amount,
    /// Part applied to pending debits.
    pub applied_to_debits: Amount,
    /// Part banked as available credit.
    pub excess: Amount,
    /// Payee net balance after the payment.
    pub net_balance_after: Amount,
}

/// Result of a distributed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentDistribution {
    /// The income transaction.
    pub transaction_id: TransactionId,
    /// Total paid.
    pub total_amount: Amount,
    /// Per-payee outcome, in request order.
    pub settlements: Vec<PayeeSettlement>,
    /// Total banked as available credit.
    pub excess_amount: Amount,
}

/// Allocates a payment across each payee's own pending debits, oldest first.
pub struct PaymentDistributor;

impl PaymentDistributor {
    /// Validates payee payments: drops zero entries, rejects negative ones,
    /// and returns the kept entries with their total. A payee named twice
    /// keeps both entries.
    pub fn normalize(payments: &[PayeePayment]) -> Result<(Vec<PayeePayment>, Amount), LedgerError> {
        let mut kept = Vec::with_capacity(payments.len());
        let mut total = Amount::ZERO;
        for payment in payments {
            if payment.amount.minor() < 0 {
                return Err(LedgerError::NegativeAmount);
            }
            if payment.amount > Amount::MAX {
                return Err(LedgerError::AmountOverflow);
            }
            if payment.amount.is_zero() {
                continue;
            }
            total = total
                .checked_add(payment.amount)
                .filter(|t| *t <= Amount::MAX)
                .ok_or(LedgerError::AmountOverflow)?;
            kept.push(*payment);
        }
        if total.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        Ok((kept, total))
    }

    /// Plans the payment inside a workspace holding every payee's ledger.
    ///
    /// One `income` transaction owns one credit receipt per payee for the
    /// payee's full amount. When the payee owes a positive net balance,
    /// `min(amount, net)` of that credit is allocated to pending debits oldest
    /// first; the rest stays available.
    pub fn distribute(
        workspace: &mut LedgerWorkspace,
        request: PaymentRequest,
    ) -> Result<PaymentDistribution, LedgerError> {
        let (payments, total) = Self::normalize(&request.payee_payments)?;
        let now = workspace.now();

        let mut txn = LedgerTransaction::new(
            TransactionKind::Income,
            request.organization_id,
            total,
            now,
        )
        .with_payer(request.payer_id)
        .with_handling(request.method, request.handled_by)
        .with_description(request.description.clone())
        .with_idempotency_key(request.idempotency_key);
        txn.payee_payments.clone_from(&payments);

        let mut settlements = Vec::with_capacity(payments.len());
        for payment in &payments {
            let scope = LedgerScope::new(payment.payee_id, request.organization_id);
            let net = workspace.balance(scope)?.net_balance;

            let credit = Receipt::credit(scope, payment.amount, txn.id, now)
                .with_academy(request.academy_id)
                .with_description(request.description.clone());
            let receipt_id = workspace.add_receipt(credit)?;
            txn.own_receipt(receipt_id);

            let for_debits = payment.amount.min(net);
            let applied = if for_debits.is_positive() {
                settle_debits_with_credit(workspace, scope, receipt_id, for_debits, &mut txn)?
            } else {
                Amount::ZERO
            };

            settlements.push(PayeeSettlement {
                payee_id: payment.payee_id,
                receipt_id,
                amount: payment.amount,
                applied_to_debits: applied,
                excess: payment.amount - applied,
                net_balance_after: workspace.balance(scope)?.net_balance,
            });
        }

        let distribution = PaymentDistribution {
            transaction_id: txn.id,
            total_amount: total,
            excess_amount: settlements.iter().map(|s| s.excess).sum(),
            settlements,
        };
        workspace.record_transaction(txn);
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PayerLedger;
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    fn payment(payee_id: PayerId, amount: i64) -> PayeePayment {
        PayeePayment {
            payee_id,
            amount: Amount::from_minor(amount),
        }
    }

    fn request(org: OrganizationId, payer: PayerId, payments: Vec<PayeePayment>) -> PaymentRequest {
        PaymentRequest {
            organization_id: org,
            payer_id: payer,
            payee_payments: payments,
            academy_id: None,
            method: Some(PaymentMethod::Cash),
            handled_by: None,
            description: None,
            idempotency_key: None,
        }
    }

    #[rstest]
    #[case::all_zero(vec![0, 0], "ZERO_AMOUNT")]
    #[case::empty(vec![], "ZERO_AMOUNT")]
    #[case::negative(vec![10, -5], "NEGATIVE_AMOUNT")]
    #[case::too_large(vec![1_000_000_000_000_001], "AMOUNT_OVERFLOW")]
    fn test_normalize_rejects(#[case] amounts: Vec<i64>, #[case] code: &str) {
        let payee = PayerId::new();
        let payments: Vec<_> = amounts.into_iter().map(|a| payment(payee, a)).collect();
        let err = PaymentDistributor::normalize(&payments).unwrap_err();
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_normalize_drops_zero_entries() {
        let payee = PayerId::new();
        let (kept, total) =
            PaymentDistributor::normalize(&[payment(payee, 0), payment(payee, 25)]).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(total, Amount::from_minor(25));
    }

    #[test]
    fn test_pays_oldest_debits_and_banks_excess() {
        let org = OrganizationId::new();
        let payee = PayerId::new();
        let scope = LedgerScope::new(payee, org);
        let base = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let older = Receipt::debit(scope, Amount::from_minor(30), TransactionId::new(), base);
        let newer = Receipt::debit(scope, Amount::from_minor(50), TransactionId::new(), base + Duration::days(7));
        let (older_id, newer_id) = (older.id, newer.id);

        let mut ledger = PayerLedger::empty(scope);
        ledger.receipts = vec![newer, older];
        let mut ws = LedgerWorkspace::new(org, base + Duration::days(10));
        ws.insert_ledger(ledger).unwrap();

        let result =
            PaymentDistributor::distribute(&mut ws, request(org, payee, vec![payment(payee, 100)])).unwrap();

        let settlement = &result.settlements[0];
        assert_eq!(settlement.applied_to_debits, Amount::from_minor(80));
        assert_eq!(settlement.excess, Amount::from_minor(20));
        assert_eq!(settlement.net_balance_after, Amount::ZERO);
        assert_eq!(result.excess_amount, Amount::from_minor(20));

        let balance = ws.balance(scope).unwrap();
        assert_eq!(balance.remaining_on(older_id), Amount::ZERO);
        assert_eq!(balance.remaining_on(newer_id), Amount::ZERO);
        assert_eq!(balance.available_credits, Amount::from_minor(20));

        let changes = ws.into_changeset().unwrap();
        assert_eq!(changes.new_receipts.len(), 1);
        assert_eq!(changes.new_allocations.len(), 2);
    }

    #[test]
    fn test_existing_credit_reduces_amount_applied() {
        let org = OrganizationId::new();
        let payee = PayerId::new();
        let scope = LedgerScope::new(payee, org);
        let mut ledger = PayerLedger::empty(scope);
        ledger.receipts = vec![
            Receipt::debit(scope, Amount::from_minor(100), TransactionId::new(), Utc::now()),
            Receipt::credit(scope, Amount::from_minor(40), TransactionId::new(), Utc::now()),
        ];
        let mut ws = LedgerWorkspace::new(org, Utc::now());
        ws.insert_ledger(ledger).unwrap();

        let result =
            PaymentDistributor::distribute(&mut ws, request(org, payee, vec![payment(payee, 100)])).unwrap();

        assert_eq!(result.settlements[0].applied_to_debits, Amount::from_minor(60));
        assert_eq!(result.settlements[0].excess, Amount::from_minor(40));
        assert_eq!(result.settlements[0].net_balance_after, Amount::ZERO);
    }

    #[test]
    fn test_multiple_payees_are_settled_independently() {
        let org = OrganizationId::new();
        let payer = PayerId::new();
        let (a, b) = (PayerId::new(), PayerId::new());
        let mut ws = LedgerWorkspace::new(org, Utc::now());
        let mut ledger_a = PayerLedger::empty(LedgerScope::new(a, org));
        ledger_a.receipts.push(Receipt::debit(
            LedgerScope::new(a, org),
            Amount::from_minor(70),
            TransactionId::new(),
            Utc::now(),
        ));
        ws.insert_ledger(ledger_a).unwrap();
        ws.insert_ledger(PayerLedger::empty(LedgerScope::new(b, org))).unwrap();

        let result = PaymentDistributor::distribute(
            &mut ws,
            request(org, payer, vec![payment(a, 50), payment(b, 0), payment(b, 30)]),
        )
        .unwrap();

        assert_eq!(result.total_amount, Amount::from_minor(80));
        assert_eq!(result.settlements.len(), 2);
        assert_eq!(result.settlements[0].net_balance_after, Amount::from_minor(20));
        assert_eq!(result.settlements[1].excess, Amount::from_minor(30));

        let changes = ws.into_changeset().unwrap();
        assert_eq!(changes.new_transactions[0].payee_payments.len(), 2);
        assert_eq!(changes.new_transactions[0].payer_id, Some(payer));
    }

    #[test]
    fn test_repeated_payee_gets_one_credit_per_entry() {
        let org = OrganizationId::new();
        let payee = PayerId::new();
        let scope = LedgerScope::new(payee, org);
        let mut ledger = PayerLedger::empty(scope);
        ledger.receipts.push(Receipt::debit(
            scope,
            Amount::from_minor(70),
            TransactionId::new(),
            Utc::now(),
        ));
        let mut ws = LedgerWorkspace::new(org, Utc::now());
        ws.insert_ledger(ledger).unwrap();

        let result = PaymentDistributor::distribute(
            &mut ws,
            request(org, payee, vec![payment(payee, 50), payment(payee, 30)]),
        )
        .unwrap();

        assert_eq!(result.settlements.len(), 2);
        assert_eq!(result.settlements[0].applied_to_debits, Amount::from_minor(50));
        assert_eq!(result.settlements[1].applied_to_debits, Amount::from_minor(20));
        assert_eq!(result.excess_amount, Amount::from_minor(10));
        assert_eq!(ws.into_changeset().unwrap().new_receipts.len(), 2);
    }
}
