//! Repository interfaces consumed by the ledger engines.
//!
//! Implementations live outside this crate (Postgres in `clubledger-db`) or in
//! [`crate::store::memory`] for tests. All of them are injected through
//! `Arc<dyn ...>` into [`crate::service::LedgerService`].

use async_trait::async_trait;

use clubledger_shared::types::{
    AllocationId, OrganizationId, PageRequest, ReceiptId, TransactionId,
};

use super::error::LedgerError;
use super::transaction::LedgerTransaction;
use super::types::{LedgerScope, PayerBalance, PayerLedger};
use super::workspace::LedgerChangeSet;
use crate::receipt::{Allocation, Receipt};

/// Read access to receipts and allocations.
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Loads every receipt and allocation of a scope, with its current version.
    ///
    /// A scope that was never written loads as an empty ledger with version zero.
    async fn load_ledger(&self, scope: LedgerScope) -> Result<PayerLedger, LedgerError>;

    /// Finds receipts by id inside an organization. Unknown ids are omitted.
    async fn find_receipts(
        &self,
        organization_id: OrganizationId,
        ids: &[ReceiptId],
    ) -> Result<Vec<Receipt>, LedgerError>;

    /// Finds every receipt whose owning transaction is `transaction_id`.
    async fn find_receipts_by_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
    ) -> Result<Vec<Receipt>, LedgerError>;

    /// Lists the receipts of a scope, oldest first.
    async fn list_receipts(
        &self,
        scope: LedgerScope,
        include_deleted: bool,
    ) -> Result<Vec<Receipt>, LedgerError>;

    /// Finds allocations by id inside an organization. Unknown ids are omitted.
    async fn find_allocations(
        &self,
        organization_id: OrganizationId,
        ids: &[AllocationId],
    ) -> Result<Vec<Allocation>, LedgerError>;
}

/// Read access to transactions.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Finds a transaction of an organization.
    async fn find_transaction(
        &self,
        organization_id: OrganizationId,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, LedgerError>;

    /// Finds the transaction that claimed an idempotency key.
    async fn find_by_idempotency_key(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError>;

    /// Lists transactions of an organization, newest first, with the total count.
    async fn list_transactions(
        &self,
        organization_id: OrganizationId,
        page: PageRequest,
    ) -> Result<(Vec<LedgerTransaction>, u64), LedgerError>;
}

/// Read access to the balance cache.
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Returns the cached balance row of a scope.
    async fn find_balance(&self, scope: LedgerScope) -> Result<Option<PayerBalance>, LedgerError>;
}

/// A store that can atomically commit a unit of work.
#[async_trait]
pub trait LedgerStore: ReceiptRepository + TransactionRepository + BalanceRepository {
    /// Commits a changeset atomically.
    ///
    /// Every balance write is compared-and-swapped on its expected version; a
    /// mismatch aborts the whole commit with
    /// [`LedgerError::ConcurrentModification`]. An idempotency key already
    /// claimed in the organization aborts with [`LedgerError::DuplicateRequest`].
    async fn commit(&self, changes: LedgerChangeSet) -> Result<(), LedgerError>;
}
