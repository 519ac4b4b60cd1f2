//! Receipt ledger logic.
//!
//! This module implements the core ledger functionality:
//! - Balance computation (`LedgerEngine`)
//! - Transactions owning receipts and allocations
//! - Reconciliation of a transaction against what it owns
//! - The in-memory unit of work and its changeset
//! - Repository interfaces for persistence
//! - Error types for ledger operations

pub mod balance;
pub mod error;
pub mod repository;
pub mod transaction;
pub mod types;
pub mod validation;
pub mod workspace;

#[cfg(test)]
mod balance_props;

pub use balance::{Inconsistency, InconsistencyKind, LedgerEngine};
pub use error::{EntityFailure, EntityRef, LedgerError};
pub use repository::{BalanceRepository, LedgerStore, ReceiptRepository, TransactionRepository};
pub use transaction::{LedgerTransaction, PayeePayment, PaymentMethod, TransactionKind};
pub use types::{
    BalanceSnapshot, BalanceTotals, LedgerScope, PayerBalance, PayerLedger, PendingDebit,
    UnconsumedCredit,
};
pub use validation::validate_reconciliation;
pub use workspace::{BalanceWrite, LedgerChangeSet, LedgerWorkspace};
