//! Transaction soft-delete workflow.
//!
//! This module implements the Active ⇄ Deleted state machine of ledger
//! transactions, with a full backup of everything a deletion touches.
//!
//! # Modules
//!
//! - `types` - Workflow domain types (TransactionState, DeletionBackup)
//! - `service` - Delete and restore logic

pub mod service;
pub mod types;

pub use service::TransactionLedger;
pub use types::{DeletionBackup, DeletionSummary, RestoreSummary, TransactionState};
