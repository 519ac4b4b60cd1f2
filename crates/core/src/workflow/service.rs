//! Soft-delete and restore of ledger transactions.
//!
//! Deletion never removes rows: owned receipts are marked deleted, every
//! allocation touching them is marked removed, and a [`DeletionBackup`] is
//! attached to the transaction. Restore puts the backed-up bodies back
//! verbatim after checking that intervening activity did not make them
//! conflict with the current ledger.

use std::collections::BTreeSet;

use tracing::warn;

use clubledger_shared::types::{ReceiptId, TransactionId, UserId};

use super::types::{DeletionBackup, DeletionSummary, RestoreSummary, TransactionState};
use crate::ledger::{
    BalanceTotals, EntityFailure, EntityRef, InconsistencyKind, LedgerEngine, LedgerError,
    LedgerScope, LedgerTransaction, LedgerWorkspace,
};
use crate::receipt::{Allocation, AllocationStatus, Receipt};

/// Two-state machine over a transaction's visibility.
pub struct TransactionLedger;

impl TransactionLedger {
    /// Validates a state transition.
    pub fn validate_transition(
        txn: &LedgerTransaction,
        target: TransactionState,
    ) -> Result<(), LedgerError> {
        let current = txn.state();
        if current.can_transition_to(target) {
            Ok(())
        } else {
            Err(LedgerError::InvalidStateTransition {
                transaction_id: txn.id,
                from: current,
                to: target,
            })
        }
    }

    /// Resolves the receipts a transaction owns.
    ///
    /// `recorded` are the receipts found for `txn.receipt_ids`; every listed id
    /// must be present. `scanned` are receipts found by owning transaction id;
    /// hits not listed on the transaction are historical bookkeeping gaps and
    /// are included with a warning.
    pub fn resolve_owned_receipts(
        txn: &LedgerTransaction,
        recorded: Vec<Receipt>,
        scanned: Vec<Receipt>,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let failures: Vec<EntityFailure> = txn
            .receipt_ids
            .iter()
            .filter(|id| !recorded.iter().any(|r| r.id == **id))
            .map(|id| EntityFailure::new(EntityRef::Receipt(*id), "receipt listed on transaction not found"))
            .collect();
        if !failures.is_empty() {
            return Err(LedgerError::PartialFailure(failures));
        }

        let mut owned = recorded;
        for receipt in scanned {
            if owned.iter().any(|r| r.id == receipt.id) {
                continue;
            }
            warn!(
                transaction_id = %txn.id,
                receipt_id = %receipt.id,
                "Receipt owned by transaction is missing from its receipt list"
            );
            owned.push(receipt);
        }

        if let Some(foreign) = owned.iter().find(|r| r.organization_id != txn.organization_id) {
            return Err(LedgerError::OrganizationMismatch {
                expected: txn.organization_id,
                actual: foreign.organization_id,
            });
        }
        Ok(owned)
    }

    /// Scopes a delete or restore must load: those of the owned receipts and
    /// of the allocations the transaction created.
    #[must_use]
    pub fn affected_scopes(receipts: &[Receipt], allocations: &[Allocation]) -> BTreeSet<LedgerScope> {
        receipts
            .iter()
            .map(Receipt::scope)
            .chain(allocations.iter().map(Allocation::scope))
            .collect()
    }

    /// Soft-deletes a transaction inside a workspace holding every affected scope.
    ///
    /// Returns the updated transaction, which is also recorded in the workspace.
    pub fn soft_delete(
        workspace: &mut LedgerWorkspace,
        mut txn: LedgerTransaction,
        owned: &[ReceiptId],
        actor: UserId,
    ) -> Result<(LedgerTransaction, DeletionSummary), LedgerError> {
        Self::validate_transition(&txn, TransactionState::Deleted)?;
        let now = workspace.now();
        let owned: BTreeSet<ReceiptId> = owned.iter().copied().collect();

        let mut failures = Vec::new();
        let mut receipts = Vec::new();
        for id in &owned {
            match workspace.receipt(*id) {
                Some(receipt) if receipt.is_active() => receipts.push(receipt.clone()),
                Some(_) => {}
                None => failures.push(EntityFailure::new(
                    EntityRef::Receipt(*id),
                    "receipt is not loaded",
                )),
            }
        }
        if !failures.is_empty() {
            return Err(LedgerError::PartialFailure(failures));
        }

        let allocations: Vec<Allocation> = workspace
            .allocations()
            .filter(|a| a.is_active())
            .filter(|a| {
                a.transaction_id == txn.id
                    || txn.allocation_ids.contains(&a.id)
                    || owned.contains(&a.debit_id)
                    || owned.contains(&a.credit_id)
            })
            .cloned()
            .collect();

        let scopes = Self::affected_scopes(&receipts, &allocations);
        let balances = Self::totals(workspace, &scopes)?;

        for receipt in &receipts {
            if let Some(stored) = workspace.receipt_mut(receipt.id) {
                stored.mark_deleted(actor, now);
            }
        }
        for allocation in &allocations {
            if let Some(stored) = workspace.allocation_mut(allocation.id) {
                stored.status = AllocationStatus::Removed;
                stored.removed_at = Some(now);
            }
        }

        let summary = DeletionSummary {
            transaction_id: txn.id,
            receipts_deleted: receipts.len(),
            allocations_removed: allocations.len(),
            balances_after: Self::totals(workspace, &scopes)?,
        };

        txn.is_deleted = true;
        txn.deleted_at = Some(now);
        txn.deleted_by = Some(actor);
        txn.updated_at = now;
        txn.deletion_backup = Some(DeletionBackup {
            receipts,
            allocations,
            balances,
            deleted_at: now,
            deleted_by: actor,
        });
        workspace.update_transaction(txn.clone());
        Ok((txn, summary))
    }

    /// Restores a soft-deleted transaction inside a workspace holding every
    /// scope named in its backup.
    ///
    /// Backed-up allocations created by a transaction listed in `retired`
    /// (deleted since) stay removed. Fails as a whole with
    /// [`LedgerError::PartialFailure`] if a backed-up entity is gone or if
    /// restoring would over-draw a credit or over-cover a debit.
    pub fn restore(
        workspace: &mut LedgerWorkspace,
        mut txn: LedgerTransaction,
        retired: &BTreeSet<TransactionId>,
    ) -> Result<(LedgerTransaction, RestoreSummary), LedgerError> {
        Self::validate_transition(&txn, TransactionState::Active)?;
        let backup = txn
            .deletion_backup
            .clone()
            .ok_or(LedgerError::MissingDeletionBackup(txn.id))?;
        let now = workspace.now();

        let mut failures: Vec<EntityFailure> = backup
            .receipts
            .iter()
            .filter(|r| workspace.receipt(r.id).is_none())
            .map(|r| EntityFailure::new(EntityRef::Receipt(r.id), "backed-up receipt not found"))
            .chain(
                backup
                    .allocations
                    .iter()
                    .filter(|a| workspace.allocation(a.id).is_none())
                    .map(|a| {
                        EntityFailure::new(EntityRef::Allocation(a.id), "backed-up allocation not found")
                    }),
            )
            .collect();
        if !failures.is_empty() {
            return Err(LedgerError::PartialFailure(failures));
        }

        for saved in &backup.receipts {
            if let Some(stored) = workspace.receipt_mut(saved.id) {
                *stored = saved.clone();
                stored.updated_at = now;
            }
        }
        let mut left_removed = 0;
        for saved in &backup.allocations {
            if saved.transaction_id != txn.id && retired.contains(&saved.transaction_id) {
                warn!(
                    transaction_id = %txn.id,
                    allocation_id = %saved.id,
                    owner_id = %saved.transaction_id,
                    "Allocation owner was deleted; keeping allocation removed"
                );
                left_removed += 1;
                continue;
            }
            if let Some(stored) = workspace.allocation_mut(saved.id) {
                *stored = saved.clone();
            }
        }

        let scopes = Self::affected_scopes(&backup.receipts, &backup.allocations);
        for scope in &scopes {
            let ledger = workspace.ledger(*scope)?;
            for found in LedgerEngine::check_consistency(*scope, &ledger.receipts, &ledger.allocations) {
                let reason = match found.kind {
                    InconsistencyKind::OverdrawnCredit => format!(
                        "credit of {} would be drawn {} after restore",
                        found.amount, found.allocated
                    ),
                    InconsistencyKind::OverCoveredDebit => format!(
                        "debit of {} would be covered {} after restore",
                        found.amount, found.allocated
                    ),
                };
                failures.push(EntityFailure::new(EntityRef::Receipt(found.receipt_id), reason));
            }
        }
        if !failures.is_empty() {
            return Err(LedgerError::PartialFailure(failures));
        }

        let summary = RestoreSummary {
            transaction_id: txn.id,
            receipts_restored: backup.receipts.len(),
            allocations_restored: backup.allocations.len() - left_removed,
            allocations_left_removed: left_removed,
            balances_after: Self::totals(workspace, &scopes)?,
        };

        txn.is_deleted = false;
        txn.deleted_at = None;
        txn.deleted_by = None;
        txn.deletion_backup = None;
        txn.updated_at = now;
        workspace.update_transaction(txn.clone());
        Ok((txn, summary))
    }

    fn totals(
        workspace: &LedgerWorkspace,
        scopes: &BTreeSet<LedgerScope>,
    ) -> Result<Vec<BalanceTotals>, LedgerError> {
        scopes
            .iter()
            .map(|scope| workspace.balance(*scope).map(|b| b.totals()))
            .collect()
    }
}
