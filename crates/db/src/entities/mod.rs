//! `SeaORM` entity definitions for the ledger schema.

pub mod allocations;
pub mod guardian_links;
pub mod ledger_transactions;
pub mod organization_settings;
pub mod payer_balances;
pub mod payers;
pub mod receipts;
