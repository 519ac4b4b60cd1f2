//! Postgres ledger store.
//!
//! Ledger loads read one repeatable-read snapshot; other reads go straight
//! to the pool. [`LedgerStore::commit`] runs one database
//! transaction: every balance row is compared-and-swapped on its version
//! first, then idempotency keys are checked, then rows are written.

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    AccessMode, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, IsolationLevel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::debug;

use clubledger_core::ledger::{
    BalanceRepository, BalanceWrite, LedgerChangeSet, LedgerError, LedgerScope, LedgerStore,
    LedgerTransaction, PayerBalance, PayerLedger, ReceiptRepository, TransactionRepository,
};
use clubledger_core::receipt::{Allocation, Receipt, ReceiptStatus};
use clubledger_shared::types::{
    AllocationId, OrganizationId, PageRequest, ReceiptId, TransactionId,
};

use crate::entities::{allocations, ledger_transactions, payer_balances, receipts};
use crate::mapping::{
    allocation_from_model, allocation_to_active, balance_from_model, balance_to_active, db_error,
    receipt_from_model, receipt_to_active, transaction_from_model, transaction_to_active,
};

/// Ledger store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn write_balance(
        txn: &DatabaseTransaction,
        write: &BalanceWrite,
    ) -> Result<(), LedgerError> {
        let balance = &write.balance;
        let conflict = LedgerError::ConcurrentModification {
            payer_id: balance.payer_id,
            organization_id: balance.organization_id,
        };

        let written = if write.expected_version == 0 {
            // First write of a scope; a concurrent first writer wins the insert.
            payer_balances::Entity::insert(balance_to_active(balance))
                .on_conflict(
                    OnConflict::columns([
                        payer_balances::Column::OrganizationId,
                        payer_balances::Column::PayerId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(txn)
                .await
                .map_err(db_error)?
        } else {
            payer_balances::Entity::update_many()
                .set(balance_to_active(balance))
                .filter(payer_balances::Column::OrganizationId.eq(balance.organization_id.into_inner()))
                .filter(payer_balances::Column::PayerId.eq(balance.payer_id.into_inner()))
                .filter(payer_balances::Column::Version.eq(write.expected_version))
                .exec(txn)
                .await
                .map_err(db_error)?
                .rows_affected
        };

        if written == 0 {
            debug!(
                payer_id = %balance.payer_id,
                expected_version = write.expected_version,
                "Balance version moved underneath commit"
            );
            return Err(conflict);
        }
        Ok(())
    }

    async fn check_idempotency(
        txn: &DatabaseTransaction,
        changes: &LedgerChangeSet,
    ) -> Result<(), LedgerError> {
        for (new_txn, key) in changes.idempotency_keys() {
            let existing = ledger_transactions::Entity::find()
                .filter(ledger_transactions::Column::OrganizationId.eq(new_txn.organization_id.into_inner()))
                .filter(ledger_transactions::Column::IdempotencyKey.eq(key))
                .one(txn)
                .await
                .map_err(db_error)?;
            if let Some(existing) = existing {
                return Err(LedgerError::DuplicateRequest {
                    key: key.to_string(),
                    existing: existing.id.into(),
                });
            }
        }
        Ok(())
    }

    async fn write_rows(txn: &DatabaseTransaction, changes: &LedgerChangeSet) -> Result<(), LedgerError> {
        for row in &changes.new_transactions {
            ledger_transactions::Entity::insert(transaction_to_active(row)?)
                .exec_without_returning(txn)
                .await
                .map_err(db_error)?;
        }
        for row in &changes.updated_transactions {
            ledger_transactions::Entity::update(transaction_to_active(row)?)
                .exec(txn)
                .await
                .map_err(db_error)?;
        }
        for row in &changes.new_receipts {
            receipts::Entity::insert(receipt_to_active(row)?)
                .exec_without_returning(txn)
                .await
                .map_err(db_error)?;
        }
        for row in &changes.updated_receipts {
            receipts::Entity::update(receipt_to_active(row)?)
                .exec(txn)
                .await
                .map_err(db_error)?;
        }
        for row in &changes.new_allocations {
            allocations::Entity::insert(allocation_to_active(row))
                .exec_without_returning(txn)
                .await
                .map_err(db_error)?;
        }
        for row in &changes.updated_allocations {
            allocations::Entity::update(allocation_to_active(row))
                .exec(txn)
                .await
                .map_err(db_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReceiptRepository for PgLedgerStore {
    async fn load_ledger(&self, scope: LedgerScope) -> Result<PayerLedger, LedgerError> {
        let org = scope.organization_id.into_inner();
        let payer = scope.payer_id.into_inner();

        // One snapshot for all reads. The version is read first so a commit
        // racing the row reads can only make the returned version stale.
        let read = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await
            .map_err(db_error)?;

        let version = payer_balances::Entity::find_by_id((org, payer))
            .one(&read)
            .await
            .map_err(db_error)?
            .map_or(0, |b| b.version);

        let receipts = receipts::Entity::find()
            .filter(receipts::Column::OrganizationId.eq(org))
            .filter(receipts::Column::PayerId.eq(payer))
            .order_by_asc(receipts::Column::CreatedAt)
            .order_by_asc(receipts::Column::Id)
            .all(&read)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(receipt_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        let allocations = allocations::Entity::find()
            .filter(allocations::Column::OrganizationId.eq(org))
            .filter(allocations::Column::PayerId.eq(payer))
            .all(&read)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(allocation_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        read.commit().await.map_err(db_error)?;

        Ok(PayerLedger {
            scope,
            version,
            receipts,
            allocations,
        })
    }

    async fn find_receipts(
        &self,
        organization_id: OrganizationId,
        ids: &[ReceiptId],
    ) -> Result<Vec<Receipt>, LedgerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        receipts::Entity::find()
            .filter(receipts::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(receipts::Column::Id.is_in(ids.iter().map(|id| id.into_inner())))
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(receipt_from_model)
            .collect()
    }

    async fn find_receipts_by_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TransactionId,
    ) -> Result<Vec<Receipt>, LedgerError> {
        receipts::Entity::find()
            .filter(receipts::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(receipts::Column::TransactionId.eq(transaction_id.into_inner()))
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(receipt_from_model)
            .collect()
    }

    async fn list_receipts(
        &self,
        scope: LedgerScope,
        include_deleted: bool,
    ) -> Result<Vec<Receipt>, LedgerError> {
        let mut query = receipts::Entity::find()
            .filter(receipts::Column::OrganizationId.eq(scope.organization_id.into_inner()))
            .filter(receipts::Column::PayerId.eq(scope.payer_id.into_inner()));
        if !include_deleted {
            query = query.filter(receipts::Column::Status.eq(ReceiptStatus::Active.as_str()));
        }
        query
            .order_by_asc(receipts::Column::CreatedAt)
            .order_by_asc(receipts::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(receipt_from_model)
            .collect()
    }

    async fn find_allocations(
        &self,
        organization_id: OrganizationId,
        ids: &[AllocationId],
    ) -> Result<Vec<Allocation>, LedgerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        allocations::Entity::find()
            .filter(allocations::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(allocations::Column::Id.is_in(ids.iter().map(|id| id.into_inner())))
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(allocation_from_model)
            .collect()
    }
}

#[async_trait]
impl TransactionRepository for PgLedgerStore {
    async fn find_transaction(
        &self,
        organization_id: OrganizationId,
        id: TransactionId,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        ledger_transactions::Entity::find_by_id(id.into_inner())
            .filter(ledger_transactions::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(transaction_from_model)
            .transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(ledger_transactions::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(transaction_from_model)
            .transpose()
    }

    async fn list_transactions(
        &self,
        organization_id: OrganizationId,
        page: PageRequest,
    ) -> Result<(Vec<LedgerTransaction>, u64), LedgerError> {
        let query = ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::OrganizationId.eq(organization_id.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(db_error)?;
        let data = query
            .order_by_desc(ledger_transactions::Column::CreatedAt)
            .order_by_desc(ledger_transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(transaction_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((data, total))
    }
}

#[async_trait]
impl BalanceRepository for PgLedgerStore {
    async fn find_balance(&self, scope: LedgerScope) -> Result<Option<PayerBalance>, LedgerError> {
        Ok(payer_balances::Entity::find_by_id((
            scope.organization_id.into_inner(),
            scope.payer_id.into_inner(),
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?
        .map(balance_from_model))
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn commit(&self, changes: LedgerChangeSet) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        // Dropping `txn` on any early return rolls the whole unit back.
        for write in &changes.balances {
            Self::write_balance(&txn, write).await?;
        }
        Self::check_idempotency(&txn, &changes).await?;
        Self::write_rows(&txn, &changes).await?;

        txn.commit().await.map_err(db_error)?;
        debug!(
            transactions = changes.new_transactions.len() + changes.updated_transactions.len(),
            receipts = changes.new_receipts.len() + changes.updated_receipts.len(),
            allocations = changes.new_allocations.len() + changes.updated_allocations.len(),
            scopes = changes.balances.len(),
            "Ledger changeset committed"
        );
        Ok(())
    }
}
