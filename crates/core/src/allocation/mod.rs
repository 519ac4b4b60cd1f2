//! Allocation of amounts to debts.
//!
//! - `strategy` - pure waterfall policies (oldest-first, largest-balance-first)
//! - `settle` - turning a plan into allocation rows inside a unit of work

pub mod settle;
pub mod strategy;

#[cfg(test)]
mod strategy_props;

pub use settle::{fund_debit_from_credits, settle_debits_with_credit};
pub use strategy::{AllocationPlan, AllocationPolicy, AllocationShare, Claim};
