//! Soft-delete domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use clubledger_shared::types::{TransactionId, UserId};

use crate::ledger::BalanceTotals;
use crate::receipt::{Allocation, Receipt};

/// Visibility state of a transaction.
///
/// The valid transitions are:
/// - Active → Deleted (soft delete)
/// - Deleted → Active (restore)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Receipts and allocations count towards balances.
    Active,
    /// Hidden; its effect is removed from balances.
    Deleted,
}

impl TransactionState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    /// Returns true if moving to `target` is a valid transition.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self != target
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot captured before a soft delete mutates anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionBackup {
    /// Owned receipts as they were before deletion.
    pub receipts: Vec<Receipt>,
    /// Allocations removed by the deletion, as they were before.
    pub allocations: Vec<Allocation>,
    /// Pre-deletion balance of every affected scope, kept for diagnostics.
    pub balances: Vec<BalanceTotals>,
    /// When the deletion happened.
    pub deleted_at: DateTime<Utc>,
    /// Who deleted.
    pub deleted_by: UserId,
}

/// Result of a soft delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    /// The deleted transaction.
    pub transaction_id: TransactionId,
    /// Number of receipts marked deleted.
    pub receipts_deleted: usize,
    /// Number of allocations removed.
    pub allocations_removed: usize,
    /// Balance of every affected scope after deletion.
    pub balances_after: Vec<BalanceTotals>,
}

/// Result of a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// The restored transaction.
    pub transaction_id: TransactionId,
    /// Number of receipts re-activated.
    pub receipts_restored: usize,
    /// Number of allocations re-activated.
    pub allocations_restored: usize,
    /// Backed-up allocations kept removed because their owner was deleted.
    pub allocations_left_removed: usize,
    /// Balance of every affected scope after restore.
    pub balances_after: Vec<BalanceTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(TransactionState::Active.can_transition_to(TransactionState::Deleted));
        assert!(TransactionState::Deleted.can_transition_to(TransactionState::Active));
        assert!(!TransactionState::Deleted.can_transition_to(TransactionState::Deleted));
        assert!(!TransactionState::Active.can_transition_to(TransactionState::Active));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TransactionState::Deleted).unwrap(),
            "\"deleted\""
        );
    }
}
