//! Reconciliation rules between a transaction and what it owns.
//!
//! Every new transaction is checked before commit: the receipts and
//! allocations it created must add up to its stated amount.

use clubledger_shared::types::Amount;

use super::error::LedgerError;
use super::transaction::{LedgerTransaction, TransactionKind};
use crate::receipt::{Allocation, Receipt, ReceiptKind};

/// Validates that a transaction's receipts and allocations reconcile with its amount.
///
/// - `invoice`: Σ debit receipts = amount
/// - `income`: Σ spendable credits = amount; a bookkeeping lump, if present,
///   also equals amount; a payee split without a lump sums to amount
/// - `expense`: no receipts, or one debit of exactly amount
/// - `internal`: Σ allocations = amount, no receipts
pub fn validate_reconciliation(
    txn: &LedgerTransaction,
    receipts: &[&Receipt],
    allocations: &[&Allocation],
) -> Result<(), LedgerError> {
    if let Some(foreign) = receipts.iter().find(|r| r.transaction_id != txn.id) {
        return Err(LedgerError::Internal(format!(
            "receipt {} is listed by transaction {} but owned by {}",
            foreign.id, txn.id, foreign.transaction_id
        )));
    }
    if let Some(foreign) = allocations.iter().find(|a| a.transaction_id != txn.id) {
        return Err(LedgerError::Internal(format!(
            "allocation {} is listed by transaction {} but owned by {}",
            foreign.id, txn.id, foreign.transaction_id
        )));
    }

    let unreconciled = |effective: Amount| LedgerError::UnreconciledTransaction {
        transaction_id: txn.id,
        stated: txn.amount,
        effective,
    };

    match txn.kind {
        TransactionKind::Invoice => {
            ensure_only(txn, receipts, ReceiptKind::Debit)?;
            let total: Amount = receipts.iter().map(|r| r.amount).sum();
            if total != txn.amount {
                return Err(unreconciled(total));
            }
        }
        TransactionKind::Income => {
            ensure_only(txn, receipts, ReceiptKind::Credit)?;
            let spendable: Amount = receipts
                .iter()
                .filter(|r| !r.bookkeeping)
                .map(|r| r.amount)
                .sum();
            if spendable != txn.amount {
                return Err(unreconciled(spendable));
            }
            let lump: Vec<&&Receipt> = receipts.iter().filter(|r| r.bookkeeping).collect();
            if lump.is_empty() {
                if !txn.payee_payments.is_empty() {
                    let split: Amount = txn.payee_payments.iter().map(|p| p.amount).sum();
                    if split != txn.amount {
                        return Err(unreconciled(split));
                    }
                }
            } else {
                let recorded: Amount = lump.iter().map(|r| r.amount).sum();
                if recorded != txn.amount {
                    return Err(unreconciled(recorded));
                }
            }
        }
        TransactionKind::Expense => match receipts {
            [] => {}
            [charge] if charge.kind == ReceiptKind::Debit => {
                if charge.amount != txn.amount {
                    return Err(unreconciled(charge.amount));
                }
            }
            _ => {
                let total: Amount = receipts.iter().map(|r| r.amount).sum();
                return Err(unreconciled(total));
            }
        },
        TransactionKind::Internal => {
            if !receipts.is_empty() {
                return Err(LedgerError::Internal(format!(
                    "internal transaction {} cannot own receipts",
                    txn.id
                )));
            }
            let total: Amount = allocations.iter().map(|a| a.amount).sum();
            if total != txn.amount {
                return Err(unreconciled(total));
            }
        }
    }

    Ok(())
}

fn ensure_only(
    txn: &LedgerTransaction,
    receipts: &[&Receipt],
    kind: ReceiptKind,
) -> Result<(), LedgerError> {
    match receipts.iter().find(|r| r.kind != kind) {
        Some(other) => Err(LedgerError::Internal(format!(
            "{} transaction {} cannot own {} receipt {}",
            txn.kind, txn.id, other.kind, other.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::PayeePayment;
    use crate::ledger::types::LedgerScope;
    use chrono::Utc;
    use clubledger_shared::types::{OrganizationId, PayerId, ReceiptId, TransactionId};

    fn scope() -> LedgerScope {
        LedgerScope::new(PayerId::new(), OrganizationId::new())
    }

    fn txn(kind: TransactionKind, amount: i64) -> LedgerTransaction {
        LedgerTransaction::new(kind, OrganizationId::new(), Amount::from_minor(amount), Utc::now())
    }

    #[test]
    fn test_invoice_must_match_debits() {
        let t = txn(TransactionKind::Invoice, 100);
        let debit = Receipt::debit(scope(), Amount::from_minor(100), t.id, Utc::now());
        assert!(validate_reconciliation(&t, &[&debit], &[]).is_ok());

        let short = Receipt::debit(scope(), Amount::from_minor(90), t.id, Utc::now());
        let result = validate_reconciliation(&t, &[&short], &[]);
        assert!(matches!(
            result,
            Err(LedgerError::UnreconciledTransaction { effective, .. }) if effective == Amount::from_minor(90)
        ));
    }

    #[test]
    fn test_income_with_lump_ignores_lump_in_spendable_sum() {
        let t = txn(TransactionKind::Income, 100);
        let lump = Receipt::credit(scope(), Amount::from_minor(100), t.id, Utc::now()).as_bookkeeping();
        let a = Receipt::credit(scope(), Amount::from_minor(70), t.id, Utc::now());
        let b = Receipt::credit(scope(), Amount::from_minor(30), t.id, Utc::now());
        assert!(validate_reconciliation(&t, &[&lump, &a, &b], &[]).is_ok());
        assert!(validate_reconciliation(&t, &[&lump, &a], &[]).is_err());
    }

    #[test]
    fn test_income_payee_split_must_match() {
        let mut t = txn(TransactionKind::Income, 100);
        t.payee_payments = vec![PayeePayment {
            payee_id: PayerId::new(),
            amount: Amount::from_minor(60),
        }];
        let credit = Receipt::credit(scope(), Amount::from_minor(100), t.id, Utc::now());
        assert!(validate_reconciliation(&t, &[&credit], &[]).is_err());
    }

    #[test]
    fn test_internal_sums_allocations() {
        let t = txn(TransactionKind::Internal, 50);
        let allocation = Allocation::new(
            scope(),
            ReceiptId::new(),
            ReceiptId::new(),
            Amount::from_minor(50),
            t.id,
            Utc::now(),
        );
        assert!(validate_reconciliation(&t, &[], &[&allocation]).is_ok());
        assert!(validate_reconciliation(&t, &[], &[]).is_err());
    }

    #[test]
    fn test_expense_without_charge_is_valid() {
        let t = txn(TransactionKind::Expense, 500);
        assert!(validate_reconciliation(&t, &[], &[]).is_ok());
    }

    #[test]
    fn test_foreign_receipt_rejected() {
        let t = txn(TransactionKind::Invoice, 100);
        let foreign = Receipt::debit(scope(), Amount::from_minor(100), TransactionId::new(), Utc::now());
        assert!(matches!(
            validate_reconciliation(&t, &[&foreign], &[]),
            Err(LedgerError::Internal(_))
        ));
    }
}
