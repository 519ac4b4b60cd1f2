//! Core business logic for Club Ledger.
//!
//! This crate contains the ledger reconciliation engine with ZERO web or
//! database dependencies. Storage is reached only through the repository
//! traits in [`ledger::repository`] and the directories in [`directory`].
//!
//! # Modules
//!
//! - `receipt` - Debit and credit receipts, allocations between them
//! - `ledger` - Balance computation, reconciliation and the unit of work
//! - `allocation` - Oldest-first and largest-first allocation policies
//! - `credit` - Automatic application of unconsumed credit
//! - `distribution` - Payer and guardian payment distribution
//! - `workflow` - Transaction soft delete and restore
//! - `service` - Retried, committed ledger operations
//! - `store` - In-memory store and directories

pub mod allocation;
pub mod credit;
pub mod directory;
pub mod distribution;
pub mod ledger;
pub mod receipt;
pub mod service;
pub mod store;
pub mod workflow;
