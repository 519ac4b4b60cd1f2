//! Conversions between `SeaORM` models and ledger domain types.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveValue::Set, DbErr};
use serde::Serialize;
use serde::de::DeserializeOwned;

use clubledger_core::directory::{OrganizationSettings, PayerProfile};
use clubledger_core::ledger::{
    LedgerError, LedgerTransaction, PaymentMethod, PayerBalance, TransactionKind,
};
use clubledger_core::receipt::{Allocation, AllocationStatus, Receipt, ReceiptKind, ReceiptStatus};
use clubledger_shared::types::{Amount, Currency};

use crate::entities::{
    allocations, ledger_transactions, organization_settings, payer_balances, payers, receipts,
};

/// Maps a database error into the ledger taxonomy.
pub(crate) fn db_error(err: DbErr) -> LedgerError {
    LedgerError::Repository(err.to_string())
}

fn corrupt(what: &str, value: &str) -> LedgerError {
    LedgerError::Repository(format!("unrecognized {what} '{value}' in storage"))
}

fn utc(ts: DateTime<FixedOffset>) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Internal(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, LedgerError> {
    serde_json::from_value(value).map_err(|e| LedgerError::Repository(e.to_string()))
}

// ============================================================================
// Receipts
// ============================================================================

pub(crate) fn receipt_from_model(model: receipts::Model) -> Result<Receipt, LedgerError> {
    Ok(Receipt {
        id: model.id.into(),
        payer_id: model.payer_id.into(),
        organization_id: model.organization_id.into(),
        academy_id: model.academy_id.map(Into::into),
        kind: ReceiptKind::parse(&model.kind).ok_or_else(|| corrupt("receipt kind", &model.kind))?,
        amount: Amount::from_minor(model.amount),
        status: ReceiptStatus::parse(&model.status)
            .ok_or_else(|| corrupt("receipt status", &model.status))?,
        transaction_id: model.transaction_id.into(),
        bookkeeping: model.bookkeeping,
        product: model.product.map(from_json).transpose()?,
        description: model.description,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
        deleted_at: model.deleted_at.map(utc),
        deleted_by: model.deleted_by.map(Into::into),
    })
}

pub(crate) fn receipt_to_active(receipt: &Receipt) -> Result<receipts::ActiveModel, LedgerError> {
    Ok(receipts::ActiveModel {
        id: Set(receipt.id.into_inner()),
        organization_id: Set(receipt.organization_id.into_inner()),
        payer_id: Set(receipt.payer_id.into_inner()),
        academy_id: Set(receipt.academy_id.map(|a| a.into_inner())),
        kind: Set(receipt.kind.as_str().to_string()),
        amount: Set(receipt.amount.minor()),
        status: Set(receipt.status.as_str().to_string()),
        transaction_id: Set(receipt.transaction_id.into_inner()),
        bookkeeping: Set(receipt.bookkeeping),
        product: Set(receipt.product.as_ref().map(to_json).transpose()?),
        description: Set(receipt.description.clone()),
        created_at: Set(receipt.created_at.into()),
        updated_at: Set(receipt.updated_at.into()),
        deleted_at: Set(receipt.deleted_at.map(Into::into)),
        deleted_by: Set(receipt.deleted_by.map(|u| u.into_inner())),
    })
}

// ============================================================================
// Allocations
// ============================================================================

pub(crate) fn allocation_from_model(model: allocations::Model) -> Result<Allocation, LedgerError> {
    Ok(Allocation {
        id: model.id.into(),
        payer_id: model.payer_id.into(),
        organization_id: model.organization_id.into(),
        debit_id: model.debit_id.into(),
        credit_id: model.credit_id.into(),
        amount: Amount::from_minor(model.amount),
        transaction_id: model.transaction_id.into(),
        status: AllocationStatus::parse(&model.status)
            .ok_or_else(|| corrupt("allocation status", &model.status))?,
        created_at: utc(model.created_at),
        removed_at: model.removed_at.map(utc),
    })
}

pub(crate) fn allocation_to_active(allocation: &Allocation) -> allocations::ActiveModel {
    allocations::ActiveModel {
        id: Set(allocation.id.into_inner()),
        organization_id: Set(allocation.organization_id.into_inner()),
        payer_id: Set(allocation.payer_id.into_inner()),
        debit_id: Set(allocation.debit_id.into_inner()),
        credit_id: Set(allocation.credit_id.into_inner()),
        amount: Set(allocation.amount.minor()),
        transaction_id: Set(allocation.transaction_id.into_inner()),
        status: Set(allocation.status.as_str().to_string()),
        created_at: Set(allocation.created_at.into()),
        removed_at: Set(allocation.removed_at.map(Into::into)),
    }
}

// ============================================================================
// Transactions
// ============================================================================

pub(crate) fn transaction_from_model(
    model: ledger_transactions::Model,
) -> Result<LedgerTransaction, LedgerError> {
    let method = match model.method.as_deref() {
        Some(raw) => Some(PaymentMethod::parse(raw).ok_or_else(|| corrupt("payment method", raw))?),
        None => None,
    };
    Ok(LedgerTransaction {
        id: model.id.into(),
        kind: TransactionKind::parse(&model.kind)
            .ok_or_else(|| corrupt("transaction kind", &model.kind))?,
        organization_id: model.organization_id.into(),
        payer_id: model.payer_id.map(Into::into),
        amount: Amount::from_minor(model.amount),
        method,
        handled_by: model.handled_by.map(Into::into),
        description: model.description,
        payee_payments: from_json(model.payee_payments)?,
        receipt_ids: from_json(model.receipt_ids)?,
        allocation_ids: from_json(model.allocation_ids)?,
        idempotency_key: model.idempotency_key,
        is_deleted: model.is_deleted,
        deletion_backup: model.deletion_backup.map(from_json).transpose()?,
        deleted_at: model.deleted_at.map(utc),
        deleted_by: model.deleted_by.map(Into::into),
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn transaction_to_active(
    txn: &LedgerTransaction,
) -> Result<ledger_transactions::ActiveModel, LedgerError> {
    Ok(ledger_transactions::ActiveModel {
        id: Set(txn.id.into_inner()),
        organization_id: Set(txn.organization_id.into_inner()),
        kind: Set(txn.kind.as_str().to_string()),
        payer_id: Set(txn.payer_id.map(|p| p.into_inner())),
        amount: Set(txn.amount.minor()),
        method: Set(txn.method.map(|m| m.as_str().to_string())),
        handled_by: Set(txn.handled_by.map(|u| u.into_inner())),
        description: Set(txn.description.clone()),
        payee_payments: Set(to_json(&txn.payee_payments)?),
        receipt_ids: Set(to_json(&txn.receipt_ids)?),
        allocation_ids: Set(to_json(&txn.allocation_ids)?),
        idempotency_key: Set(txn.idempotency_key.clone()),
        is_deleted: Set(txn.is_deleted),
        deletion_backup: Set(txn.deletion_backup.as_ref().map(to_json).transpose()?),
        deleted_at: Set(txn.deleted_at.map(Into::into)),
        deleted_by: Set(txn.deleted_by.map(|u| u.into_inner())),
        created_at: Set(txn.created_at.into()),
        updated_at: Set(txn.updated_at.into()),
    })
}

// ============================================================================
// Balance cache
// ============================================================================

pub(crate) fn balance_from_model(model: payer_balances::Model) -> PayerBalance {
    PayerBalance {
        payer_id: model.payer_id.into(),
        organization_id: model.organization_id.into(),
        outstanding_debits: Amount::from_minor(model.outstanding_debits),
        available_credit: Amount::from_minor(model.available_credit),
        net_balance: Amount::from_minor(model.net_balance),
        version: model.version,
        updated_at: utc(model.updated_at),
    }
}

pub(crate) fn balance_to_active(balance: &PayerBalance) -> payer_balances::ActiveModel {
    payer_balances::ActiveModel {
        organization_id: Set(balance.organization_id.into_inner()),
        payer_id: Set(balance.payer_id.into_inner()),
        outstanding_debits: Set(balance.outstanding_debits.minor()),
        available_credit: Set(balance.available_credit.minor()),
        net_balance: Set(balance.net_balance.minor()),
        version: Set(balance.version),
        updated_at: Set(balance.updated_at.into()),
    }
}

// ============================================================================
// Directories
// ============================================================================

pub(crate) fn payer_from_model(model: payers::Model) -> PayerProfile {
    PayerProfile {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        display_name: model.display_name,
        email: model.email,
    }
}

pub(crate) fn settings_from_model(
    model: organization_settings::Model,
) -> Result<OrganizationSettings, LedgerError> {
    let currency: Currency = model
        .currency
        .trim()
        .parse()
        .map_err(|_| corrupt("currency", &model.currency))?;
    Ok(OrganizationSettings {
        organization_id: model.organization_id.into(),
        currency,
        locale: model.locale,
    })
}
