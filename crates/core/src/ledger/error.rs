//! Ledger error types for validation, state and concurrency errors.
//!
//! This module defines all errors that can occur during ledger operations,
//! including amount validation, lookups, soft-delete state transitions,
//! reconciliation checks and optimistic concurrency conflicts.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use clubledger_shared::types::{
    AllocationId, Amount, AmountError, OrganizationId, PayerId, ReceiptId, TransactionId,
};

use crate::workflow::types::TransactionState;

/// The entity an individual failure inside a multi-entity operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// A receipt.
    Receipt(ReceiptId),
    /// An allocation.
    Allocation(AllocationId),
    /// A payer ledger.
    Payer(PayerId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receipt(id) => write!(f, "receipt {id}"),
            Self::Allocation(id) => write!(f, "allocation {id}"),
            Self::Payer(id) => write!(f, "payer {id}"),
        }
    }
}

/// One failed entity inside an aggregated [`LedgerError::PartialFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    /// The entity that failed.
    pub entity: EntityRef,
    /// Why it failed.
    pub reason: String,
}

impl EntityFailure {
    /// Creates a failure record.
    pub fn new(entity: EntityRef, reason: impl Into<String>) -> Self {
        Self {
            entity,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Amount Errors ==========
    /// Amount cannot be zero.
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Amount cannot be negative.
    #[error("Amount cannot be negative")]
    NegativeAmount,

    /// Amount exceeds the supported range.
    #[error("Amount exceeds the supported range")]
    AmountOverflow,

    /// Amount could not be interpreted.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // ========== Lookup Errors ==========
    /// Payer not found in the organization.
    #[error("Payer not found: {0}")]
    PayerNotFound(PayerId),

    /// Organization has no ledger settings.
    #[error("Organization not found: {0}")]
    OrganizationNotFound(OrganizationId),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Receipt not found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(ReceiptId),

    // ========== Business Rule Errors ==========
    /// Credit can only be applied to a debit receipt.
    #[error("Receipt {0} is not an active debit")]
    NotADebit(ReceiptId),

    /// A receipt belongs to another payer or organization.
    #[error("Receipt {0} does not belong to the requested payer")]
    ReceiptScopeMismatch(ReceiptId),

    /// An entity belongs to another organization.
    #[error("Organization mismatch: expected {expected}, got {actual}")]
    OrganizationMismatch {
        /// The organization of the request.
        expected: OrganizationId,
        /// The organization of the entity.
        actual: OrganizationId,
    },

    /// A parent transaction cannot own additional credit receipts.
    #[error("Transaction {0} is not an active income transaction that can own credits")]
    ParentNotIncome(TransactionId),

    /// The receipts of a transaction do not add up to its stated amount.
    #[error("Transaction {transaction_id} does not reconcile: stated {stated}, receipts {effective}")]
    UnreconciledTransaction {
        /// The transaction being checked.
        transaction_id: TransactionId,
        /// The amount stated on the transaction.
        stated: Amount,
        /// The amount its receipts or allocations add up to.
        effective: Amount,
    },

    // ========== Transaction State Errors ==========
    /// Invalid soft-delete state transition.
    #[error("Cannot move transaction {transaction_id} from {from} to {to}")]
    InvalidStateTransition {
        /// The transaction.
        transaction_id: TransactionId,
        /// Current state.
        from: TransactionState,
        /// Requested state.
        to: TransactionState,
    },

    /// A deleted transaction carries no backup to restore from.
    #[error("Transaction {0} has no deletion backup")]
    MissingDeletionBackup(TransactionId),

    /// Some entities of a multi-entity operation failed; nothing was written.
    #[error("Operation failed for {} entities", .0.len())]
    PartialFailure(Vec<EntityFailure>),

    // ========== Idempotency / Concurrency Errors ==========
    /// The idempotency key was already used in this organization.
    #[error("Idempotency key '{key}' was already used by transaction {existing}")]
    DuplicateRequest {
        /// The reused key.
        key: String,
        /// The transaction created by the first request.
        existing: TransactionId,
    },

    /// Another writer changed the payer ledger since it was loaded.
    #[error("Concurrent modification of payer {payer_id} in organization {organization_id}, please retry")]
    ConcurrentModification {
        /// Payer of the conflicting scope.
        payer_id: PayerId,
        /// Organization of the conflicting scope.
        organization_id: OrganizationId,
    },

    // ========== Infrastructure Errors ==========
    /// Repository (storage) error.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::PayerNotFound(_) => "PAYER_NOT_FOUND",
            Self::OrganizationNotFound(_) => "ORGANIZATION_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::ReceiptNotFound(_) => "RECEIPT_NOT_FOUND",
            Self::NotADebit(_) => "NOT_A_DEBIT",
            Self::ReceiptScopeMismatch(_) => "RECEIPT_SCOPE_MISMATCH",
            Self::OrganizationMismatch { .. } => "ORGANIZATION_MISMATCH",
            Self::ParentNotIncome(_) => "PARENT_NOT_INCOME",
            Self::UnreconciledTransaction { .. } => "UNRECONCILED_TRANSACTION",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::MissingDeletionBackup(_) => "MISSING_DELETION_BACKUP",
            Self::PartialFailure(_) => "PARTIAL_FAILURE",
            Self::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::Repository(_) => "REPOSITORY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::ZeroAmount
            | Self::NegativeAmount
            | Self::AmountOverflow
            | Self::InvalidAmount(_)
            | Self::NotADebit(_)
            | Self::ReceiptScopeMismatch(_)
            | Self::OrganizationMismatch { .. }
            | Self::ParentNotIncome(_)
            | Self::InvalidStateTransition { .. }
            | Self::MissingDeletionBackup(_) => 400,

            // 404 Not Found
            Self::PayerNotFound(_)
            | Self::OrganizationNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::ReceiptNotFound(_) => 404,

            // 409 Conflict
            Self::PartialFailure(_)
            | Self::DuplicateRequest { .. }
            | Self::ConcurrentModification { .. } => 409,

            // 422 Unprocessable Entity
            Self::UnreconciledTransaction { .. } => 422,

            // 500 Internal Server Error
            Self::Repository(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Zero => Self::ZeroAmount,
            AmountError::Negative => Self::NegativeAmount,
            AmountError::Overflow => Self::AmountOverflow,
            other @ AmountError::TooPrecise { .. } => Self::InvalidAmount(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubledger_shared::types::Currency;
    use rust_decimal::Decimal;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::ZeroAmount.error_code(), "ZERO_AMOUNT");
        assert_eq!(LedgerError::NegativeAmount.error_code(), "NEGATIVE_AMOUNT");
        assert_eq!(
            LedgerError::MissingDeletionBackup(TransactionId::new()).error_code(),
            "MISSING_DELETION_BACKUP"
        );
        assert_eq!(
            LedgerError::PartialFailure(vec![]).error_code(),
            "PARTIAL_FAILURE"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(LedgerError::ZeroAmount.http_status_code(), 400);
        assert_eq!(
            LedgerError::PayerNotFound(PayerId::new()).http_status_code(),
            404
        );
        assert_eq!(
            LedgerError::DuplicateRequest {
                key: "k".to_string(),
                existing: TransactionId::new(),
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            LedgerError::UnreconciledTransaction {
                transaction_id: TransactionId::new(),
                stated: Amount::from_minor(100),
                effective: Amount::from_minor(90),
            }
            .http_status_code(),
            422
        );
        assert_eq!(
            LedgerError::Repository("down".to_string()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(
            LedgerError::ConcurrentModification {
                payer_id: PayerId::new(),
                organization_id: OrganizationId::new(),
            }
            .is_retryable()
        );
        assert!(!LedgerError::ZeroAmount.is_retryable());
        assert!(!LedgerError::PartialFailure(vec![]).is_retryable());
    }

    #[test]
    fn test_from_amount_error() {
        assert!(matches!(
            LedgerError::from(AmountError::Zero),
            LedgerError::ZeroAmount
        ));
        assert!(matches!(
            LedgerError::from(AmountError::Overflow),
            LedgerError::AmountOverflow
        ));
        let err = LedgerError::from(AmountError::TooPrecise {
            value: Decimal::new(10005, 3),
            currency: Currency::Usd,
        });
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }

    #[test]
    fn test_error_display() {
        let id = TransactionId::new();
        let err = LedgerError::InvalidStateTransition {
            transaction_id: id,
            from: TransactionState::Deleted,
            to: TransactionState::Deleted,
        };
        assert_eq!(
            err.to_string(),
            format!("Cannot move transaction {id} from deleted to deleted")
        );

        let err = LedgerError::PartialFailure(vec![EntityFailure::new(
            EntityRef::Receipt(ReceiptId::new()),
            "missing",
        )]);
        assert_eq!(err.to_string(), "Operation failed for 1 entities");
    }
}
