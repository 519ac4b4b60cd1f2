//! Response bodies and amount conversion.
//!
//! Amounts cross the HTTP boundary as decimal strings in the organization
//! currency (`"12.50"` for USD, `"1500"` for JPY). Internally they stay in
//! minor units.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use clubledger_core::credit::CreditApplication;
use clubledger_core::distribution::{GuardianDistribution, PaymentDistribution};
use clubledger_core::ledger::{
    BalanceSnapshot, BalanceTotals, LedgerError, LedgerTransaction, PayerBalance,
};
use clubledger_core::receipt::Receipt;
use clubledger_core::service::CreditApplicationStatus;
use clubledger_core::workflow::{DeletionSummary, RestoreSummary};
use clubledger_shared::types::{
    AcademyId, AllocationId, Amount, Currency, PayerId, ReceiptId, TransactionId, UserId,
};

/// Parses a strictly positive decimal amount.
pub fn parse_amount(raw: &str, currency: Currency) -> Result<Amount, LedgerError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| LedgerError::InvalidAmount(format!("'{raw}' is not a decimal")))?;
    Ok(Amount::from_decimal(value, currency)?)
}

/// Parses a payee share; zero is accepted and dropped later.
pub fn parse_share(raw: &str, currency: Currency) -> Result<Amount, LedgerError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| LedgerError::InvalidAmount(format!("'{raw}' is not a decimal")))?;
    if value.is_zero() {
        return Ok(Amount::ZERO);
    }
    parse_amount(raw, currency)
}

/// Formats an amount as a decimal string.
pub fn money(amount: Amount, currency: Currency) -> String {
    amount.to_decimal(currency).to_string()
}

/// A receipt.
#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    /// Receipt ID.
    pub id: ReceiptId,
    /// Owning payer.
    pub payer_id: PayerId,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// `debit` or `credit`.
    pub kind: &'static str,
    /// Amount.
    pub amount: String,
    /// `active` or `deleted`.
    pub status: &'static str,
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Record-only guardian lump receipt.
    pub bookkeeping: bool,
    /// Product name.
    pub product: Option<String>,
    /// Payment deadline.
    pub deadline: Option<NaiveDate>,
    /// Description.
    pub description: Option<String>,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Deleted at.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ReceiptResponse {
    /// Converts a receipt.
    pub fn from_receipt(receipt: &Receipt, currency: Currency) -> Self {
        Self {
            id: receipt.id,
            payer_id: receipt.payer_id,
            academy_id: receipt.academy_id,
            kind: receipt.kind.as_str(),
            amount: money(receipt.amount, currency),
            status: receipt.status.as_str(),
            transaction_id: receipt.transaction_id,
            bookkeeping: receipt.bookkeeping,
            product: receipt.product.as_ref().map(|p| p.name.clone()),
            deadline: receipt.product.as_ref().and_then(|p| p.deadline),
            description: receipt.description.clone(),
            created_at: receipt.created_at,
            deleted_at: receipt.deleted_at,
        }
    }
}

/// One payee's part of a transaction.
#[derive(Debug, Serialize)]
pub struct PayeeShareResponse {
    /// Payee.
    pub payee_id: PayerId,
    /// Amount.
    pub amount: String,
}

/// A transaction.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: TransactionId,
    /// `income`, `expense`, `internal` or `invoice`.
    pub kind: &'static str,
    /// Payment maker or invoiced payer.
    pub payer_id: Option<PayerId>,
    /// Stated amount.
    pub amount: String,
    /// Payment method.
    pub method: Option<&'static str>,
    /// Handler.
    pub handled_by: Option<UserId>,
    /// Description.
    pub description: Option<String>,
    /// Per-payee split.
    pub payee_payments: Vec<PayeeShareResponse>,
    /// Owned receipts.
    pub receipt_ids: Vec<ReceiptId>,
    /// Owned allocations.
    pub allocation_ids: Vec<AllocationId>,
    /// Idempotency key.
    pub idempotency_key: Option<String>,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Deleted at.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Deleted by.
    pub deleted_by: Option<UserId>,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Updated at.
    pub updated_at: DateTime<Utc>,
}

impl TransactionResponse {
    /// Converts a transaction.
    pub fn from_transaction(txn: &LedgerTransaction, currency: Currency) -> Self {
        Self {
            id: txn.id,
            kind: txn.kind.as_str(),
            payer_id: txn.payer_id,
            amount: money(txn.amount, currency),
            method: txn.method.map(|m| m.as_str()),
            handled_by: txn.handled_by,
            description: txn.description.clone(),
            payee_payments: txn
                .payee_payments
                .iter()
                .map(|p| PayeeShareResponse {
                    payee_id: p.payee_id,
                    amount: money(p.amount, currency),
                })
                .collect(),
            receipt_ids: txn.receipt_ids.clone(),
            allocation_ids: txn.allocation_ids.clone(),
            idempotency_key: txn.idempotency_key.clone(),
            is_deleted: txn.is_deleted,
            deleted_at: txn.deleted_at,
            deleted_by: txn.deleted_by,
            created_at: txn.created_at,
            updated_at: txn.updated_at,
        }
    }
}

/// Outcome of applying credit to a debit.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreditApplicationResponse {
    /// Auto-apply is switched off.
    Disabled,
    /// The payer had no unconsumed credit.
    NothingToApply,
    /// Credit was applied.
    Applied {
        /// The internal transaction owning the allocations.
        transaction_id: TransactionId,
        /// Amount applied.
        applied: String,
        /// Credits drawn from.
        credits_drawn: Vec<ReceiptId>,
        /// Credit left afterwards.
        available_after: String,
    },
    /// Applying failed; the debit itself was kept.
    Failed {
        /// Failure reason.
        message: String,
    },
}

impl CreditApplicationResponse {
    /// Converts an application status.
    pub fn from_status(status: &CreditApplicationStatus, currency: Currency) -> Self {
        match status {
            CreditApplicationStatus::Disabled => Self::Disabled,
            CreditApplicationStatus::NothingToApply => Self::NothingToApply,
            CreditApplicationStatus::Applied(application) => {
                Self::from_application(application, currency)
            }
            CreditApplicationStatus::Failed { message } => Self::Failed {
                message: message.clone(),
            },
        }
    }

    fn from_application(application: &CreditApplication, currency: Currency) -> Self {
        Self::Applied {
            transaction_id: application.transaction_id,
            applied: money(application.applied, currency),
            credits_drawn: application.credits_drawn.clone(),
            available_after: money(application.available_after, currency),
        }
    }
}

/// Balance figures of one scope.
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    /// Payer.
    pub payer_id: PayerId,
    /// Sum of debit remainders.
    pub outstanding_debits: String,
    /// Unconsumed credit.
    pub available_credits: String,
    /// Net amount owed, never negative.
    pub net_balance: String,
}

impl TotalsResponse {
    /// Converts scope totals.
    pub fn from_totals(totals: &BalanceTotals, currency: Currency) -> Self {
        Self {
            payer_id: totals.scope.payer_id,
            outstanding_debits: money(totals.outstanding_debits, currency),
            available_credits: money(totals.available_credits, currency),
            net_balance: money(totals.net_balance, currency),
        }
    }
}

/// A pending debit.
#[derive(Debug, Serialize)]
pub struct PendingDebitResponse {
    /// Debit receipt.
    pub receipt_id: ReceiptId,
    /// Invoice amount.
    pub amount: String,
    /// Remainder owed.
    pub remaining: String,
}

/// An unconsumed credit.
#[derive(Debug, Serialize)]
pub struct UnconsumedCreditResponse {
    /// Credit receipt.
    pub receipt_id: ReceiptId,
    /// Original amount.
    pub amount: String,
    /// Unconsumed remainder.
    pub available: String,
}

/// Cached balance row.
#[derive(Debug, Serialize)]
pub struct CachedBalanceResponse {
    /// Cached outstanding debits.
    pub outstanding_debits: String,
    /// Cached available credit.
    pub available_credit: String,
    /// Cached net balance.
    pub net_balance: String,
    /// Ledger version.
    pub version: i64,
    /// Last write.
    pub updated_at: DateTime<Utc>,
}

impl CachedBalanceResponse {
    /// Converts a cache row.
    pub fn from_balance(balance: &PayerBalance, currency: Currency) -> Self {
        Self {
            outstanding_debits: money(balance.outstanding_debits, currency),
            available_credit: money(balance.available_credit, currency),
            net_balance: money(balance.net_balance, currency),
            version: balance.version,
            updated_at: balance.updated_at,
        }
    }
}

/// Live balance plus the cache row.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Payer.
    pub payer_id: PayerId,
    /// Currency of every amount.
    pub currency: Currency,
    /// Sum of debit remainders.
    pub outstanding_debits: String,
    /// Unconsumed credit.
    pub available_credits: String,
    /// Net amount owed.
    pub net_balance: String,
    /// Debits with a remainder, oldest first.
    pub pending_debits: Vec<PendingDebitResponse>,
    /// Credits with a remainder, oldest first.
    pub unconsumed_credits: Vec<UnconsumedCreditResponse>,
    /// The cached row, when one was written.
    pub cached: Option<CachedBalanceResponse>,
}

impl BalanceResponse {
    /// Combines a live snapshot with the cache row.
    pub fn new(snapshot: &BalanceSnapshot, cached: Option<&PayerBalance>, currency: Currency) -> Self {
        Self {
            payer_id: snapshot.scope.payer_id,
            currency,
            outstanding_debits: money(snapshot.outstanding_debits, currency),
            available_credits: money(snapshot.available_credits, currency),
            net_balance: money(snapshot.net_balance, currency),
            pending_debits: snapshot
                .pending_debits
                .iter()
                .map(|d| PendingDebitResponse {
                    receipt_id: d.receipt_id,
                    amount: money(d.amount, currency),
                    remaining: money(d.remaining, currency),
                })
                .collect(),
            unconsumed_credits: snapshot
                .unconsumed_credits
                .iter()
                .map(|c| UnconsumedCreditResponse {
                    receipt_id: c.receipt_id,
                    amount: money(c.amount, currency),
                    available: money(c.available, currency),
                })
                .collect(),
            cached: cached.map(|b| CachedBalanceResponse::from_balance(b, currency)),
        }
    }
}

/// One payee's settlement.
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    /// Payee.
    pub payee_id: PayerId,
    /// Credit receipt.
    pub receipt_id: ReceiptId,
    /// Amount paid.
    pub amount: String,
    /// Part applied to debits.
    pub applied_to_debits: String,
    /// Part banked as credit.
    pub excess: String,
    /// Net balance afterwards.
    pub net_balance_after: String,
}

/// Result of a payer payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Income transaction.
    pub transaction_id: TransactionId,
    /// Total paid.
    pub total_amount: String,
    /// Total banked as credit.
    pub excess_amount: String,
    /// Per-payee outcome.
    pub settlements: Vec<SettlementResponse>,
}

impl PaymentResponse {
    /// Converts a distribution.
    pub fn from_distribution(result: &PaymentDistribution, currency: Currency) -> Self {
        Self {
            transaction_id: result.transaction_id,
            total_amount: money(result.total_amount, currency),
            excess_amount: money(result.excess_amount, currency),
            settlements: result
                .settlements
                .iter()
                .map(|s| SettlementResponse {
                    payee_id: s.payee_id,
                    receipt_id: s.receipt_id,
                    amount: money(s.amount, currency),
                    applied_to_debits: money(s.applied_to_debits, currency),
                    excess: money(s.excess, currency),
                    net_balance_after: money(s.net_balance_after, currency),
                })
                .collect(),
        }
    }
}

/// One payee's share of a guardian payment.
#[derive(Debug, Serialize)]
pub struct GuardianShareResponse {
    /// Payee.
    pub payee_id: PayerId,
    /// Credit receipt.
    pub receipt_id: ReceiptId,
    /// Paid towards the payee.
    pub amount_paid: String,
    /// Net balance still owed.
    pub remaining_balance: String,
}

/// Result of a guardian payment.
#[derive(Debug, Serialize)]
pub struct GuardianPaymentResponse {
    /// Income transaction.
    pub transaction_id: TransactionId,
    /// Bookkeeping lump receipt.
    pub guardian_receipt_id: ReceiptId,
    /// Lump amount.
    pub total_amount: String,
    /// Paid to payees.
    pub distributed_amount: String,
    /// Banked as guardian credit.
    pub excess_amount: String,
    /// Guardian credit receipt.
    pub excess_receipt_id: Option<ReceiptId>,
    /// Per-payee shares, largest balance first.
    pub distributions: Vec<GuardianShareResponse>,
    /// Payees brought to zero.
    pub players_fully_paid: u32,
}

impl GuardianPaymentResponse {
    /// Converts a guardian distribution.
    pub fn from_distribution(result: &GuardianDistribution, currency: Currency) -> Self {
        Self {
            transaction_id: result.transaction_id,
            guardian_receipt_id: result.guardian_receipt_id,
            total_amount: money(result.total_amount, currency),
            distributed_amount: money(result.distributed_amount, currency),
            excess_amount: money(result.excess_amount, currency),
            excess_receipt_id: result.excess_receipt_id,
            distributions: result
                .distributions
                .iter()
                .map(|d| GuardianShareResponse {
                    payee_id: d.payee_id,
                    receipt_id: d.receipt_id,
                    amount_paid: money(d.amount_paid, currency),
                    remaining_balance: money(d.remaining_balance, currency),
                })
                .collect(),
            players_fully_paid: result.players_fully_paid,
        }
    }
}

/// Result of a soft delete or a restore.
#[derive(Debug, Serialize)]
pub struct StateChangeResponse {
    /// Transaction.
    pub transaction_id: TransactionId,
    /// Receipts deleted or restored.
    pub receipts: usize,
    /// Allocations removed or restored.
    pub allocations: usize,
    /// Balances afterwards.
    pub balances_after: Vec<TotalsResponse>,
}

impl StateChangeResponse {
    /// Converts a deletion summary.
    pub fn from_deletion(summary: &DeletionSummary, currency: Currency) -> Self {
        Self {
            transaction_id: summary.transaction_id,
            receipts: summary.receipts_deleted,
            allocations: summary.allocations_removed,
            balances_after: totals(&summary.balances_after, currency),
        }
    }

    /// Converts a restore summary.
    pub fn from_restore(summary: &RestoreSummary, currency: Currency) -> Self {
        Self {
            transaction_id: summary.transaction_id,
            receipts: summary.receipts_restored,
            allocations: summary.allocations_restored,
            balances_after: totals(&summary.balances_after, currency),
        }
    }
}

fn totals(all: &[BalanceTotals], currency: Currency) -> Vec<TotalsResponse> {
    all.iter()
        .map(|t| TotalsResponse::from_totals(t, currency))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12.50", Currency::Usd, 1250)]
    #[case(" 7 ", Currency::Eur, 700)]
    #[case("1500", Currency::Jpy, 1500)]
    fn test_parse_amount(#[case] raw: &str, #[case] currency: Currency, #[case] minor: i64) {
        assert_eq!(parse_amount(raw, currency).unwrap(), Amount::from_minor(minor));
    }

    #[rstest]
    #[case("0", "ZERO_AMOUNT")]
    #[case("-3", "NEGATIVE_AMOUNT")]
    #[case("1.005", "INVALID_AMOUNT")]
    #[case("ten", "INVALID_AMOUNT")]
    fn test_parse_amount_rejects(#[case] raw: &str, #[case] code: &str) {
        assert_eq!(parse_amount(raw, Currency::Usd).unwrap_err().error_code(), code);
    }

    #[test]
    fn test_parse_share_accepts_zero() {
        assert_eq!(parse_share("0.00", Currency::Usd).unwrap(), Amount::ZERO);
        assert!(parse_share("-1", Currency::Usd).is_err());
    }

    #[test]
    fn test_money_uses_currency_exponent() {
        assert_eq!(money(Amount::from_minor(1250), Currency::Usd), "12.50");
        assert_eq!(money(Amount::from_minor(1500), Currency::Jpy), "1500");
    }
}
