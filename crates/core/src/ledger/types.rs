//! Domain types for balance computation and the balance cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use clubledger_shared::types::{Amount, OrganizationId, PayerId, ReceiptId};

use crate::receipt::{Allocation, Receipt};

/// The partition key of the ledger: one payer inside one organization.
///
/// Receipts, allocations and cached balances never cross scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerScope {
    /// The payer.
    pub payer_id: PayerId,
    /// The organization.
    pub organization_id: OrganizationId,
}

impl LedgerScope {
    /// Creates a scope.
    #[must_use]
    pub const fn new(payer_id: PayerId, organization_id: OrganizationId) -> Self {
        Self {
            payer_id,
            organization_id,
        }
    }
}

impl fmt::Display for LedgerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.payer_id, self.organization_id)
    }
}

/// A debit with an outstanding remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDebit {
    /// The debit receipt.
    pub receipt_id: ReceiptId,
    /// Invoice amount.
    pub amount: Amount,
    /// Credit already applied to it.
    pub applied: Amount,
    /// `amount - applied`, strictly positive.
    pub remaining: Amount,
    /// Issue time, used for oldest-first ordering.
    pub created_at: DateTime<Utc>,
}

/// A credit with an unconsumed remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnconsumedCredit {
    /// The credit receipt.
    pub receipt_id: ReceiptId,
    /// Original credit amount.
    pub amount: Amount,
    /// Amount already drawn by allocations.
    pub drawn: Amount,
    /// `amount - drawn`, strictly positive.
    pub available: Amount,
    /// Payment time, used for oldest-first ordering.
    pub created_at: DateTime<Utc>,
}

/// Result of computing a payer's balance from its receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    /// The scope the snapshot was computed for.
    pub scope: LedgerScope,
    /// Sum of debit remainders.
    pub outstanding_debits: Amount,
    /// Sum of unconsumed credit.
    pub available_credits: Amount,
    /// `max(0, outstanding_debits - available_credits)`.
    pub net_balance: Amount,
    /// Debits with a remainder, oldest first.
    pub pending_debits: Vec<PendingDebit>,
    /// Credits with an unconsumed remainder, oldest first.
    pub unconsumed_credits: Vec<UnconsumedCredit>,
}

impl BalanceSnapshot {
    /// An empty balance.
    #[must_use]
    pub fn empty(scope: LedgerScope) -> Self {
        Self {
            scope,
            outstanding_debits: Amount::ZERO,
            available_credits: Amount::ZERO,
            net_balance: Amount::ZERO,
            pending_debits: Vec::new(),
            unconsumed_credits: Vec::new(),
        }
    }

    /// Remaining amount of a pending debit, zero if it is settled or unknown.
    #[must_use]
    pub fn remaining_on(&self, debit_id: ReceiptId) -> Amount {
        self.pending_debits
            .iter()
            .find(|d| d.receipt_id == debit_id)
            .map_or(Amount::ZERO, |d| d.remaining)
    }

    /// Oldest pending debit creation time.
    #[must_use]
    pub fn oldest_pending_since(&self) -> Option<DateTime<Utc>> {
        self.pending_debits.iter().map(|d| d.created_at).min()
    }

    /// The headline totals.
    #[must_use]
    pub fn totals(&self) -> BalanceTotals {
        BalanceTotals {
            scope: self.scope,
            outstanding_debits: self.outstanding_debits,
            available_credits: self.available_credits,
            net_balance: self.net_balance,
        }
    }
}

/// Headline balance figures of one scope, as retained in deletion backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTotals {
    /// The scope.
    pub scope: LedgerScope,
    /// Sum of debit remainders.
    pub outstanding_debits: Amount,
    /// Sum of unconsumed credit.
    pub available_credits: Amount,
    /// Net amount owed.
    pub net_balance: Amount,
}

/// Denormalized balance cache row for one scope.
///
/// Advisory only: always rewritten from a [`BalanceSnapshot`] inside the
/// same commit as the mutation. `version` doubles as the scope's optimistic
/// concurrency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerBalance {
    /// The payer.
    pub payer_id: PayerId,
    /// The organization.
    pub organization_id: OrganizationId,
    /// Cached outstanding debits.
    pub outstanding_debits: Amount,
    /// Cached available credit.
    pub available_credit: Amount,
    /// Cached net balance.
    pub net_balance: Amount,
    /// Ledger version of the scope.
    pub version: i64,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl PayerBalance {
    /// Builds the cache row for a freshly computed snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &BalanceSnapshot, version: i64, now: DateTime<Utc>) -> Self {
        Self {
            payer_id: snapshot.scope.payer_id,
            organization_id: snapshot.scope.organization_id,
            outstanding_debits: snapshot.outstanding_debits,
            available_credit: snapshot.available_credits,
            net_balance: snapshot.net_balance,
            version,
            updated_at: now,
        }
    }

    /// The scope of this row.
    #[must_use]
    pub fn scope(&self) -> LedgerScope {
        LedgerScope::new(self.payer_id, self.organization_id)
    }

    /// Returns true if the cached figures match a snapshot.
    #[must_use]
    pub fn matches(&self, snapshot: &BalanceSnapshot) -> bool {
        self.outstanding_debits == snapshot.outstanding_debits
            && self.available_credit == snapshot.available_credits
            && self.net_balance == snapshot.net_balance
    }
}

/// Everything stored for one scope, loaded as a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerLedger {
    /// The scope.
    pub scope: LedgerScope,
    /// Version observed at load time; zero when the scope has never been written.
    pub version: i64,
    /// All receipts of the scope, including soft-deleted ones.
    pub receipts: Vec<Receipt>,
    /// All allocations of the scope, including removed ones.
    pub allocations: Vec<Allocation>,
}

impl PayerLedger {
    /// An empty, never-written scope.
    #[must_use]
    pub fn empty(scope: LedgerScope) -> Self {
        Self {
            scope,
            version: 0,
            receipts: Vec::new(),
            allocations: Vec::new(),
        }
    }

    /// Finds a receipt by id.
    #[must_use]
    pub fn receipt(&self, id: ReceiptId) -> Option<&Receipt> {
        self.receipts.iter().find(|r| r.id == id)
    }
}
