//! Ledger transactions: the owners of receipts and allocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use clubledger_shared::types::{
    AllocationId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::workflow::types::{DeletionBackup, TransactionState};

/// Kind of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money received from a payer.
    Income,
    /// Money paid out by the organization.
    Expense,
    /// System-generated credit application, no cash movement.
    Internal,
    /// Invoice issuance owning debit receipts.
    Invoice,
}

impl TransactionKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Internal => "internal",
            Self::Invoice => "invoice",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "internal" => Some(Self::Internal),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How money changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the front desk.
    Cash,
    /// Card terminal or online card payment.
    Card,
    /// Bank transfer.
    BankTransfer,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// Returns the string representation of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Other => "other",
        }
    }

    /// Parses a method from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "bank_transfer" => Some(Self::BankTransfer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// One payee's share of a multi-payee income transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeePayment {
    /// The payer whose ledger receives the credit.
    pub payee_id: PayerId,
    /// Amount credited to the payee.
    pub amount: Amount,
}

/// A financial transaction owning a set of receipts and allocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Payment maker, invoiced payer, or charged payer.
    pub payer_id: Option<PayerId>,
    /// Stated amount.
    pub amount: Amount,
    /// Payment method for cash movements.
    pub method: Option<PaymentMethod>,
    /// Staff member who handled the transaction.
    pub handled_by: Option<UserId>,
    /// Free-form description.
    pub description: Option<String>,
    /// Per-payee split of an income transaction.
    pub payee_payments: Vec<PayeePayment>,
    /// Receipts created by this transaction.
    pub receipt_ids: Vec<ReceiptId>,
    /// Allocations created by this transaction.
    pub allocation_ids: Vec<AllocationId>,
    /// Client-supplied idempotency key, unique per organization.
    pub idempotency_key: Option<String>,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Snapshot taken at soft-delete time.
    pub deletion_backup: Option<DeletionBackup>,
    /// When the transaction was soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Who soft-deleted the transaction.
    pub deleted_by: Option<UserId>,
    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
    /// When the transaction was last updated.
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Creates an active transaction with no receipts yet.
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        organization_id: OrganizationId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            kind,
            organization_id,
            payer_id: None,
            amount,
            method: None,
            handled_by: None,
            description: None,
            payee_payments: Vec::new(),
            receipt_ids: Vec::new(),
            allocation_ids: Vec::new(),
            idempotency_key: None,
            is_deleted: false,
            deletion_backup: None,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the payer.
    #[must_use]
    pub fn with_payer(mut self, payer_id: PayerId) -> Self {
        self.payer_id = Some(payer_id);
        self
    }

    /// Sets method and handler.
    #[must_use]
    pub fn with_handling(mut self, method: Option<PaymentMethod>, handled_by: Option<UserId>) -> Self {
        self.method = method;
        self.handled_by = handled_by;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Current soft-delete state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        if self.is_deleted {
            TransactionState::Deleted
        } else {
            TransactionState::Active
        }
    }

    /// Records a receipt as owned by this transaction.
    pub fn own_receipt(&mut self, receipt_id: ReceiptId) {
        if !self.receipt_ids.contains(&receipt_id) {
            self.receipt_ids.push(receipt_id);
        }
    }

    /// Records an allocation as created by this transaction.
    pub fn own_allocation(&mut self, allocation_id: AllocationId) {
        if !self.allocation_ids.contains(&allocation_id) {
            self.allocation_ids.push(allocation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(TransactionKind::parse("INVOICE"), Some(TransactionKind::Invoice));
        assert_eq!(TransactionKind::parse("refund"), None);
        assert_eq!(PaymentMethod::parse("bank_transfer"), Some(PaymentMethod::BankTransfer));
    }

    #[test]
    fn test_owned_ids_are_unique() {
        let mut txn = LedgerTransaction::new(
            TransactionKind::Income,
            OrganizationId::new(),
            Amount::from_minor(10),
            Utc::now(),
        );
        let receipt = ReceiptId::new();
        txn.own_receipt(receipt);
        txn.own_receipt(receipt);
        assert_eq!(txn.receipt_ids, vec![receipt]);
        assert_eq!(txn.state(), TransactionState::Active);
    }
}
