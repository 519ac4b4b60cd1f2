//! Ledger schema migration.
//!
//! Creates payers, guardian links, organization settings, ledger
//! transactions, receipts, allocations and the payer balance cache.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DIRECTORY_SQL).await?;
        db.execute_unprepared(LEDGER_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
DROP TABLE IF EXISTS payer_balances CASCADE;
DROP TABLE IF EXISTS allocations CASCADE;
DROP TABLE IF EXISTS receipts CASCADE;
DROP TABLE IF EXISTS ledger_transactions CASCADE;
DROP TABLE IF EXISTS organization_settings CASCADE;
DROP TABLE IF EXISTS guardian_links CASCADE;
DROP TABLE IF EXISTS payers CASCADE;
",
        )
        .await?;
        Ok(())
    }
}

const DIRECTORY_SQL: &str = r"
CREATE TABLE payers (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    display_name VARCHAR(255) NOT NULL,
    email VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_payers_org UNIQUE (id, organization_id)
);

CREATE INDEX idx_payers_org ON payers(organization_id);

CREATE TABLE guardian_links (
    guardian_id UUID NOT NULL,
    payee_id UUID NOT NULL,
    organization_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (guardian_id, payee_id),
    FOREIGN KEY (guardian_id, organization_id) REFERENCES payers(id, organization_id) ON DELETE CASCADE,
    FOREIGN KEY (payee_id, organization_id) REFERENCES payers(id, organization_id) ON DELETE CASCADE,
    CONSTRAINT chk_guardian_not_self CHECK (guardian_id <> payee_id)
);

CREATE INDEX idx_guardian_links_guardian ON guardian_links(organization_id, guardian_id);

CREATE TABLE organization_settings (
    organization_id UUID PRIMARY KEY,
    currency CHAR(3) NOT NULL,
    locale VARCHAR(16) NOT NULL DEFAULT 'en',
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const LEDGER_SQL: &str = r"
-- Amounts are minor currency units
CREATE TABLE ledger_transactions (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    kind VARCHAR(16) NOT NULL,
    payer_id UUID,
    amount BIGINT NOT NULL,
    method VARCHAR(32),
    handled_by UUID,
    description TEXT,
    payee_payments JSONB NOT NULL DEFAULT '[]',
    receipt_ids JSONB NOT NULL DEFAULT '[]',
    allocation_ids JSONB NOT NULL DEFAULT '[]',
    idempotency_key VARCHAR(255),
    is_deleted BOOLEAN NOT NULL DEFAULT false,
    deletion_backup JSONB,
    deleted_at TIMESTAMPTZ,
    deleted_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_txn_kind CHECK (kind IN ('income', 'expense', 'internal', 'invoice')),
    CONSTRAINT chk_txn_amount CHECK (amount >= 0),
    CONSTRAINT chk_txn_backup CHECK (is_deleted OR deletion_backup IS NULL)
);

CREATE UNIQUE INDEX uq_txn_idempotency ON ledger_transactions(organization_id, idempotency_key)
    WHERE idempotency_key IS NOT NULL;
CREATE INDEX idx_txn_org_created ON ledger_transactions(organization_id, created_at DESC, id DESC);

CREATE TABLE receipts (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    payer_id UUID NOT NULL,
    academy_id UUID,
    kind VARCHAR(8) NOT NULL,
    amount BIGINT NOT NULL,
    status VARCHAR(8) NOT NULL DEFAULT 'active',
    transaction_id UUID NOT NULL REFERENCES ledger_transactions(id) DEFERRABLE INITIALLY DEFERRED,
    bookkeeping BOOLEAN NOT NULL DEFAULT false,
    product JSONB,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    deleted_by UUID,
    CONSTRAINT chk_receipt_kind CHECK (kind IN ('debit', 'credit')),
    CONSTRAINT chk_receipt_status CHECK (status IN ('active', 'deleted')),
    CONSTRAINT chk_receipt_amount CHECK (amount > 0),
    CONSTRAINT chk_bookkeeping_credit CHECK (NOT bookkeeping OR kind = 'credit')
);

CREATE INDEX idx_receipts_scope ON receipts(organization_id, payer_id, created_at, id);
CREATE INDEX idx_receipts_transaction ON receipts(organization_id, transaction_id);

CREATE TABLE allocations (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    payer_id UUID NOT NULL,
    debit_id UUID NOT NULL REFERENCES receipts(id) DEFERRABLE INITIALLY DEFERRED,
    credit_id UUID NOT NULL REFERENCES receipts(id) DEFERRABLE INITIALLY DEFERRED,
    amount BIGINT NOT NULL,
    transaction_id UUID NOT NULL REFERENCES ledger_transactions(id) DEFERRABLE INITIALLY DEFERRED,
    status VARCHAR(8) NOT NULL DEFAULT 'active',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    removed_at TIMESTAMPTZ,
    CONSTRAINT chk_allocation_status CHECK (status IN ('active', 'removed')),
    CONSTRAINT chk_allocation_amount CHECK (amount > 0),
    CONSTRAINT chk_allocation_ends CHECK (debit_id <> credit_id)
);

CREATE INDEX idx_allocations_scope ON allocations(organization_id, payer_id);
CREATE INDEX idx_allocations_debit ON allocations(debit_id) WHERE status = 'active';
CREATE INDEX idx_allocations_credit ON allocations(credit_id) WHERE status = 'active';

-- Balance cache; version is the optimistic lock of the payer ledger
CREATE TABLE payer_balances (
    organization_id UUID NOT NULL,
    payer_id UUID NOT NULL,
    outstanding_debits BIGINT NOT NULL DEFAULT 0,
    available_credit BIGINT NOT NULL DEFAULT 0,
    net_balance BIGINT NOT NULL DEFAULT 0,
    version BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (organization_id, payer_id),
    CONSTRAINT chk_balance_non_negative CHECK (
        outstanding_debits >= 0 AND available_credit >= 0 AND net_balance >= 0
    )
);
";
