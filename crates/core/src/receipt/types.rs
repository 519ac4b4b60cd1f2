//! Receipt domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use clubledger_shared::types::{
    AcademyId, AllocationId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::ledger::types::LedgerScope;

/// Receipt kind. The sign of a receipt is carried here, never by its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    /// An invoice or obligation owed by the payer.
    Debit,
    /// A payment or credit balance held by the payer.
    Credit,
}

impl ReceiptKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft visibility of a receipt. Receipts are never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Counted by balance computation.
    Active,
    /// Hidden by a transaction soft-delete.
    Deleted,
}

impl ReceiptStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Product details printed on a debit receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Product or tuition item name.
    pub name: String,
    /// Catalog unit price in minor units.
    pub price: Amount,
    /// Date the invoice was issued.
    pub invoice_date: NaiveDate,
    /// Optional payment deadline.
    pub deadline: Option<NaiveDate>,
}

/// A per-payer debit or credit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique identifier.
    pub id: ReceiptId,
    /// The payer owning this receipt.
    pub payer_id: PayerId,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Optional academy inside the organization.
    pub academy_id: Option<AcademyId>,
    /// Debit or credit.
    pub kind: ReceiptKind,
    /// Strictly positive amount in minor units.
    pub amount: Amount,
    /// Active or soft-deleted.
    pub status: ReceiptStatus,
    /// The transaction that created this receipt.
    pub transaction_id: TransactionId,
    /// Record-only credit (a guardian's lump payment) ignored by balance computation.
    pub bookkeeping: bool,
    /// Product details (debits only).
    pub product: Option<ProductInfo>,
    /// Free-form description.
    pub description: Option<String>,
    /// When the receipt was created.
    pub created_at: DateTime<Utc>,
    /// When the receipt was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the receipt was soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Who soft-deleted the receipt.
    pub deleted_by: Option<UserId>,
}

impl Receipt {
    /// Creates an active debit receipt.
    #[must_use]
    pub fn debit(
        scope: LedgerScope,
        amount: Amount,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(scope, ReceiptKind::Debit, amount, transaction_id, now)
    }

    /// Creates an active credit receipt.
    #[must_use]
    pub fn credit(
        scope: LedgerScope,
        amount: Amount,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(scope, ReceiptKind::Credit, amount, transaction_id, now)
    }

    fn build(
        scope: LedgerScope,
        kind: ReceiptKind,
        amount: Amount,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReceiptId::new(),
            payer_id: scope.payer_id,
            organization_id: scope.organization_id,
            academy_id: None,
            kind,
            amount,
            status: ReceiptStatus::Active,
            transaction_id,
            bookkeeping: false,
            product: None,
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Sets the academy.
    #[must_use]
    pub fn with_academy(mut self, academy_id: Option<AcademyId>) -> Self {
        self.academy_id = academy_id;
        self
    }

    /// Sets the product details.
    #[must_use]
    pub fn with_product(mut self, product: Option<ProductInfo>) -> Self {
        self.product = product;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Marks the receipt as a record-only lump payment.
    #[must_use]
    pub fn as_bookkeeping(mut self) -> Self {
        self.bookkeeping = true;
        self
    }

    /// The payer/organization scope of this receipt.
    #[must_use]
    pub fn scope(&self) -> LedgerScope {
        LedgerScope::new(self.payer_id, self.organization_id)
    }

    /// Returns true if the receipt counts towards balances.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReceiptStatus::Active
    }

    /// Returns true for an active, non-bookkeeping debit.
    #[must_use]
    pub fn is_open_debit(&self) -> bool {
        self.is_active() && self.kind == ReceiptKind::Debit
    }

    /// Returns true for an active, non-bookkeeping credit.
    #[must_use]
    pub fn is_spendable_credit(&self) -> bool {
        self.is_active() && self.kind == ReceiptKind::Credit && !self.bookkeeping
    }

    /// Soft-deletes the receipt.
    pub fn mark_deleted(&mut self, actor: UserId, now: DateTime<Utc>) {
        self.status = ReceiptStatus::Deleted;
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor);
        self.updated_at = now;
    }

    /// Brings a soft-deleted receipt back, clearing deletion metadata.
    pub fn mark_restored(&mut self, now: DateTime<Utc>) {
        self.status = ReceiptStatus::Active;
        self.deleted_at = None;
        self.deleted_by = None;
        self.updated_at = now;
    }
}

/// Whether an allocation currently links its credit to its debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    /// The credit amount is applied to the debit.
    Active,
    /// The link was dropped by a soft-delete.
    Removed,
}

impl AllocationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Application of part of a credit to a debit of the same payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique identifier.
    pub id: AllocationId,
    /// Payer owning both ends.
    pub payer_id: PayerId,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The debit receiving credit.
    pub debit_id: ReceiptId,
    /// The credit being drawn.
    pub credit_id: ReceiptId,
    /// Applied amount in minor units.
    pub amount: Amount,
    /// The transaction that created this allocation.
    pub transaction_id: TransactionId,
    /// Active or removed.
    pub status: AllocationStatus,
    /// When the allocation was created.
    pub created_at: DateTime<Utc>,
    /// When the allocation was removed.
    pub removed_at: Option<DateTime<Utc>>,
}

impl Allocation {
    /// Creates an active allocation.
    #[must_use]
    pub fn new(
        scope: LedgerScope,
        debit_id: ReceiptId,
        credit_id: ReceiptId,
        amount: Amount,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            payer_id: scope.payer_id,
            organization_id: scope.organization_id,
            debit_id,
            credit_id,
            amount,
            transaction_id,
            status: AllocationStatus::Active,
            created_at: now,
            removed_at: None,
        }
    }

    /// The payer/organization scope of this allocation.
    #[must_use]
    pub fn scope(&self) -> LedgerScope {
        LedgerScope::new(self.payer_id, self.organization_id)
    }

    /// Returns true if the allocation links its receipts.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }

    /// Returns true if either end is the given receipt.
    #[must_use]
    pub fn touches(&self, receipt_id: ReceiptId) -> bool {
        self.debit_id == receipt_id || self.credit_id == receipt_id
    }
}
