//! Request and result types of [`super::LedgerService`].

use serde::Serialize;

use clubledger_shared::types::{
    AcademyId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId, UserId,
};

use crate::credit::CreditApplication;
use crate::ledger::{LedgerTransaction, PaymentMethod};
use crate::receipt::{ProductInfo, Receipt};

/// Invoice issuance for one payer.
#[derive(Debug, Clone)]
pub struct NewDebit {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The invoiced payer.
    pub payer_id: PayerId,
    /// Academy inside the organization.
    pub academy_id: Option<AcademyId>,
    /// Amount owed.
    pub amount: Amount,
    /// Product details, including the optional deadline.
    pub product: Option<ProductInfo>,
    /// Free-form description.
    pub description: Option<String>,
    /// Staff member issuing the invoice.
    pub handled_by: Option<UserId>,
    /// Client idempotency key.
    pub idempotency_key: Option<String>,
}

/// A standalone credit for one payer.
#[derive(Debug, Clone)]
pub struct NewCredit {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The credited payer.
    pub payer_id: PayerId,
    /// Academy inside the organization.
    pub academy_id: Option<AcademyId>,
    /// Credit amount.
    pub amount: Amount,
    /// Existing income transaction to attach the credit to.
    pub parent_transaction_id: Option<TransactionId>,
    /// Debit to apply the credit to right away.
    pub sibling_debit_id: Option<ReceiptId>,
    /// Free-form description.
    pub description: Option<String>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Staff member recording the credit.
    pub handled_by: Option<UserId>,
    /// Client idempotency key; only used when a new transaction is created.
    pub idempotency_key: Option<String>,
}

/// A payment by one payer into their own ledger.
#[derive(Debug, Clone)]
pub struct IncomePayment {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The paying payer.
    pub payer_id: PayerId,
    /// Amount paid.
    pub amount: Amount,
    /// Academy inside the organization.
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

/// A guardian lump payment across every linked payee.
#[derive(Debug, Clone)]
pub struct GuardianPayment {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// The paying guardian.
    pub guardian_id: PayerId,
    /// Lump amount.
    pub amount: Amount,
    /// Academy inside the organization.
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

/// Money paid out by the organization.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Amount paid out.
    pub amount: Amount,
    /// Payer to re-invoice the expense to.
    pub charged_to: Option<PayerId>,
    /// Academy inside the organization.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Staff member recording the expense.
    pub handled_by: Option<UserId>,
    /// Free-form description.
    pub description: Option<String>,
    /// Client idempotency key.
    pub idempotency_key: Option<String>,
}

/// What happened when unconsumed credit was offered to a new debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreditApplicationStatus {
    /// Automatic application is switched off.
    Disabled,
    /// The payer had no unconsumed credit.
    NothingToApply,
    /// Credit was applied.
    Applied(CreditApplication),
    /// Application failed; the debit itself was kept.
    Failed {
        /// Error description.
        message: String,
    },
}

/// Result of issuing a debit.
#[derive(Debug, Clone, Serialize)]
pub struct DebitReceiptResult {
    /// The owning invoice transaction.
    pub transaction: LedgerTransaction,
    /// The debit receipt.
    pub receipt: Receipt,
    /// Outcome of automatic credit application.
    pub credit_application: CreditApplicationStatus,
}

/// Result of recording a credit.
#[derive(Debug, Clone, Serialize)]
pub struct CreditReceiptResult {
    /// The owning income transaction (new or the grown parent).
    pub transaction: LedgerTransaction,
    /// The credit receipt.
    pub receipt: Receipt,
    /// Part applied to the sibling debit.
    pub applied_to_debit: Amount,
}

/// Result of recording an expense.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseResult {
    /// The expense transaction.
    pub transaction: LedgerTransaction,
    /// Debit issued to the charged payer, if any.
    pub charge_receipt: Option<Receipt>,
    /// Outcome of automatic credit application on the charge.
    pub credit_application: CreditApplicationStatus,
}
