//! Unit of work over one or more payer ledgers.
//!
//! A `LedgerWorkspace` holds the loaded [`PayerLedger`] of every scope an
//! operation touches. Planners mutate it in memory; [`LedgerWorkspace::into_changeset`]
//! reconciles new transactions, recomputes the balance cache of every loaded
//! scope and produces the [`LedgerChangeSet`] a store commits atomically.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use clubledger_shared::types::{AllocationId, OrganizationId, ReceiptId};

use super::balance::LedgerEngine;
use super::error::LedgerError;
use super::transaction::LedgerTransaction;
use super::types::{BalanceSnapshot, LedgerScope, PayerBalance, PayerLedger};
use super::validation::validate_reconciliation;
use crate::receipt::{Allocation, Receipt, ReceiptKind};

/// Cache row to write, guarded by the version observed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceWrite {
    /// Version the scope had when it was loaded.
    pub expected_version: i64,
    /// The new row; its version is `expected_version + 1`.
    pub balance: PayerBalance,
}

/// Everything one unit of work writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerChangeSet {
    /// Transactions to insert.
    pub new_transactions: Vec<LedgerTransaction>,
    /// Transactions to overwrite.
    pub updated_transactions: Vec<LedgerTransaction>,
    /// Receipts to insert.
    pub new_receipts: Vec<Receipt>,
    /// Receipts to overwrite.
    pub updated_receipts: Vec<Receipt>,
    /// Allocations to insert.
    pub new_allocations: Vec<Allocation>,
    /// Allocations to overwrite.
    pub updated_allocations: Vec<Allocation>,
    /// Balance cache rows, one per loaded scope.
    pub balances: Vec<BalanceWrite>,
}

impl LedgerChangeSet {
    /// Idempotency keys claimed by the new transactions.
    pub fn idempotency_keys(&self) -> impl Iterator<Item = (&LedgerTransaction, &str)> {
        self.new_transactions
            .iter()
            .filter_map(|t| t.idempotency_key.as_deref().map(|key| (t, key)))
    }

    /// Scopes whose version the commit compares and swaps.
    pub fn scopes(&self) -> impl Iterator<Item = LedgerScope> + '_ {
        self.balances.iter().map(|w| w.balance.scope())
    }
}

/// In-memory unit of work.
#[derive(Debug)]
pub struct LedgerWorkspace {
    organization_id: OrganizationId,
    now: DateTime<Utc>,
    ledgers: BTreeMap<LedgerScope, PayerLedger>,
    new_transactions: Vec<LedgerTransaction>,
    updated_transactions: Vec<LedgerTransaction>,
    new_receipts: BTreeSet<ReceiptId>,
    dirty_receipts: BTreeSet<ReceiptId>,
    new_allocations: BTreeSet<AllocationId>,
    dirty_allocations: BTreeSet<AllocationId>,
}

impl LedgerWorkspace {
    /// Creates an empty workspace for one organization.
    #[must_use]
    pub fn new(organization_id: OrganizationId, now: DateTime<Utc>) -> Self {
        Self {
            organization_id,
            now,
            ledgers: BTreeMap::new(),
            new_transactions: Vec::new(),
            updated_transactions: Vec::new(),
            new_receipts: BTreeSet::new(),
            dirty_receipts: BTreeSet::new(),
            new_allocations: BTreeSet::new(),
            dirty_allocations: BTreeSet::new(),
        }
    }

    /// The organization every loaded scope belongs to.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// The timestamp stamped on everything this unit of work writes.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Adds a loaded ledger. Loading the same scope twice keeps the first copy.
    pub fn insert_ledger(&mut self, ledger: PayerLedger) -> Result<(), LedgerError> {
        if ledger.scope.organization_id != self.organization_id {
            return Err(LedgerError::OrganizationMismatch {
                expected: self.organization_id,
                actual: ledger.scope.organization_id,
            });
        }
        self.ledgers.entry(ledger.scope).or_insert(ledger);
        Ok(())
    }

    /// Returns true if the scope is loaded.
    #[must_use]
    pub fn contains(&self, scope: LedgerScope) -> bool {
        self.ledgers.contains_key(&scope)
    }

    /// Loaded scopes, in key order.
    pub fn scopes(&self) -> impl Iterator<Item = LedgerScope> + '_ {
        self.ledgers.keys().copied()
    }

    /// The loaded ledger of a scope.
    pub fn ledger(&self, scope: LedgerScope) -> Result<&PayerLedger, LedgerError> {
        self.ledgers
            .get(&scope)
            .ok_or_else(|| LedgerError::Internal(format!("ledger {scope} is not loaded")))
    }

    fn ledger_mut(&mut self, scope: LedgerScope) -> Result<&mut PayerLedger, LedgerError> {
        self.ledgers
            .get_mut(&scope)
            .ok_or_else(|| LedgerError::Internal(format!("ledger {scope} is not loaded")))
    }

    /// Current balance of a loaded scope, including pending changes.
    pub fn balance(&self, scope: LedgerScope) -> Result<BalanceSnapshot, LedgerError> {
        let ledger = self.ledger(scope)?;
        Ok(LedgerEngine::compute(scope, &ledger.receipts, &ledger.allocations))
    }

    /// Finds a receipt in any loaded scope.
    #[must_use]
    pub fn receipt(&self, id: ReceiptId) -> Option<&Receipt> {
        self.ledgers.values().find_map(|l| l.receipt(id))
    }

    /// Finds an allocation in any loaded scope.
    #[must_use]
    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation> {
        self.ledgers
            .values()
            .flat_map(|l| l.allocations.iter())
            .find(|a| a.id == id)
    }

    /// Every allocation of every loaded scope.
    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.ledgers.values().flat_map(|l| l.allocations.iter())
    }

    /// Adds a new receipt to its scope.
    pub fn add_receipt(&mut self, receipt: Receipt) -> Result<ReceiptId, LedgerError> {
        let id = receipt.id;
        self.ledger_mut(receipt.scope())?.receipts.push(receipt);
        self.new_receipts.insert(id);
        Ok(id)
    }

    /// Mutable access to a loaded receipt; the receipt is written on commit.
    pub fn receipt_mut(&mut self, id: ReceiptId) -> Option<&mut Receipt> {
        let receipt = self
            .ledgers
            .values_mut()
            .flat_map(|l| l.receipts.iter_mut())
            .find(|r| r.id == id)?;
        if !self.new_receipts.contains(&id) {
            self.dirty_receipts.insert(id);
        }
        Some(receipt)
    }

    /// Adds a new allocation after checking that both ends are active
    /// receipts of the allocation's scope.
    pub fn add_allocation(&mut self, allocation: Allocation) -> Result<AllocationId, LedgerError> {
        let scope = allocation.scope();
        let ledger = self.ledger(scope)?;
        let debit = ledger
            .receipt(allocation.debit_id)
            .ok_or(LedgerError::ReceiptScopeMismatch(allocation.debit_id))?;
        if !debit.is_open_debit() {
            return Err(LedgerError::NotADebit(allocation.debit_id));
        }
        let credit = ledger
            .receipt(allocation.credit_id)
            .ok_or(LedgerError::ReceiptScopeMismatch(allocation.credit_id))?;
        if credit.kind != ReceiptKind::Credit || !credit.is_spendable_credit() {
            return Err(LedgerError::Internal(format!(
                "receipt {} cannot fund allocations",
                credit.id
            )));
        }

        let id = allocation.id;
        self.ledger_mut(scope)?.allocations.push(allocation);
        self.new_allocations.insert(id);
        Ok(id)
    }

    /// Mutable access to a loaded allocation; the allocation is written on commit.
    pub fn allocation_mut(&mut self, id: AllocationId) -> Option<&mut Allocation> {
        let allocation = self
            .ledgers
            .values_mut()
            .flat_map(|l| l.allocations.iter_mut())
            .find(|a| a.id == id)?;
        if !self.new_allocations.contains(&id) {
            self.dirty_allocations.insert(id);
        }
        Some(allocation)
    }

    /// Records a transaction created by this unit of work.
    pub fn record_transaction(&mut self, txn: LedgerTransaction) {
        self.new_transactions.push(txn);
    }

    /// Records an existing transaction to overwrite.
    pub fn update_transaction(&mut self, txn: LedgerTransaction) {
        self.updated_transactions.retain(|t| t.id != txn.id);
        self.updated_transactions.push(txn);
    }

    /// Reconciles new transactions and produces the changeset.
    ///
    /// The balance cache of every loaded scope is recomputed and its version
    /// bumped, so any concurrent writer of those scopes will conflict.
    pub fn into_changeset(self) -> Result<LedgerChangeSet, LedgerError> {
        for txn in &self.new_transactions {
            let receipts = txn
                .receipt_ids
                .iter()
                .map(|id| {
                    self.receipt(*id).ok_or_else(|| {
                        LedgerError::Internal(format!(
                            "transaction {} lists unknown receipt {id}",
                            txn.id
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let allocations = txn
                .allocation_ids
                .iter()
                .map(|id| {
                    self.allocation(*id).ok_or_else(|| {
                        LedgerError::Internal(format!(
                            "transaction {} lists unknown allocation {id}",
                            txn.id
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            validate_reconciliation(txn, &receipts, &allocations)?;
        }

        let mut changes = LedgerChangeSet::default();
        for ledger in self.ledgers.values() {
            let snapshot = LedgerEngine::compute(ledger.scope, &ledger.receipts, &ledger.allocations);
            changes.balances.push(BalanceWrite {
                expected_version: ledger.version,
                balance: PayerBalance::from_snapshot(&snapshot, ledger.version + 1, self.now),
            });
            for receipt in &ledger.receipts {
                if self.new_receipts.contains(&receipt.id) {
                    changes.new_receipts.push(receipt.clone());
                } else if self.dirty_receipts.contains(&receipt.id) {
                    changes.updated_receipts.push(receipt.clone());
                }
            }
            for allocation in &ledger.allocations {
                if self.new_allocations.contains(&allocation.id) {
                    changes.new_allocations.push(allocation.clone());
                } else if self.dirty_allocations.contains(&allocation.id) {
                    changes.updated_allocations.push(allocation.clone());
                }
            }
        }
        changes.new_transactions = self.new_transactions;
        changes.updated_transactions = self.updated_transactions;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::TransactionKind;
    use clubledger_shared::types::{Amount, PayerId};

    fn workspace() -> (LedgerWorkspace, LedgerScope) {
        let org = OrganizationId::new();
        let scope = LedgerScope::new(PayerId::new(), org);
        let mut ws = LedgerWorkspace::new(org, Utc::now());
        ws.insert_ledger(PayerLedger::empty(scope)).unwrap();
        (ws, scope)
    }

    #[test]
    fn test_changeset_contains_new_rows_and_bumped_balance() {
        let (mut ws, scope) = workspace();
        let mut txn = LedgerTransaction::new(
            TransactionKind::Invoice,
            scope.organization_id,
            Amount::from_minor(100),
            ws.now(),
        );
        let debit = Receipt::debit(scope, Amount::from_minor(100), txn.id, ws.now());
        txn.own_receipt(ws.add_receipt(debit).unwrap());
        ws.record_transaction(txn);

        let changes = ws.into_changeset().unwrap();

        assert_eq!(changes.new_transactions.len(), 1);
        assert_eq!(changes.new_receipts.len(), 1);
        assert!(changes.updated_receipts.is_empty());
        assert_eq!(changes.balances.len(), 1);
        assert_eq!(changes.balances[0].expected_version, 0);
        assert_eq!(changes.balances[0].balance.version, 1);
        assert_eq!(changes.balances[0].balance.outstanding_debits, Amount::from_minor(100));
    }

    #[test]
    fn test_unreconciled_transaction_blocks_changeset() {
        let (mut ws, scope) = workspace();
        let mut txn = LedgerTransaction::new(
            TransactionKind::Invoice,
            scope.organization_id,
            Amount::from_minor(100),
            ws.now(),
        );
        let debit = Receipt::debit(scope, Amount::from_minor(60), txn.id, ws.now());
        txn.own_receipt(ws.add_receipt(debit).unwrap());
        ws.record_transaction(txn);

        assert!(matches!(
            ws.into_changeset(),
            Err(LedgerError::UnreconciledTransaction { .. })
        ));
    }

    #[test]
    fn test_allocation_requires_both_ends_in_scope() {
        let (mut ws, scope) = workspace();
        let txn_id = clubledger_shared::types::TransactionId::new();
        let debit = ws
            .add_receipt(Receipt::debit(scope, Amount::from_minor(10), txn_id, ws.now()))
            .unwrap();
        let allocation = Allocation::new(
            scope,
            debit,
            ReceiptId::new(),
            Amount::from_minor(10),
            txn_id,
            ws.now(),
        );
        assert!(matches!(
            ws.add_allocation(allocation),
            Err(LedgerError::ReceiptScopeMismatch(_))
        ));
    }

    #[test]
    fn test_mutating_loaded_receipt_marks_it_updated() {
        let org = OrganizationId::new();
        let scope = LedgerScope::new(PayerId::new(), org);
        let existing = Receipt::debit(
            scope,
            Amount::from_minor(10),
            clubledger_shared::types::TransactionId::new(),
            Utc::now(),
        );
        let id = existing.id;
        let mut ledger = PayerLedger::empty(scope);
        ledger.version = 4;
        ledger.receipts.push(existing);

        let mut ws = LedgerWorkspace::new(org, Utc::now());
        ws.insert_ledger(ledger).unwrap();
        let now = ws.now();
        ws.receipt_mut(id)
            .unwrap()
            .mark_deleted(clubledger_shared::types::UserId::new(), now);

        let changes = ws.into_changeset().unwrap();
        assert_eq!(changes.updated_receipts.len(), 1);
        assert_eq!(changes.balances[0].expected_version, 4);
        assert_eq!(changes.balances[0].balance.outstanding_debits, Amount::ZERO);
    }
}
