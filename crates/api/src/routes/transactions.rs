//! Payment, expense and transaction lifecycle routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use clubledger_core::distribution::PaymentRequest;
use clubledger_core::ledger::{PayeePayment, PaymentMethod};
use clubledger_core::service::{GuardianPayment, IncomePayment, NewExpense};
use clubledger_shared::types::{
    AcademyId, OrganizationId, PageMeta, PageRequest, PayerId, TransactionId,
};

use super::org_currency;
use crate::extractors::{ActorId, HandledBy, IdempotencyKey};
use crate::response::{
    CreditApplicationResponse, GuardianPaymentResponse, PaymentResponse, ReceiptResponse,
    StateChangeResponse, TransactionResponse, parse_amount, parse_share,
};
use crate::{ApiError, AppState};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/organizations/{org_id}/transactions", get(list_transactions))
        .route("/organizations/{org_id}/transactions/income", post(create_income))
        .route("/organizations/{org_id}/transactions/multi-payee", post(create_multi_payee))
        .route("/organizations/{org_id}/transactions/guardian", post(create_guardian_payment))
        .route("/organizations/{org_id}/transactions/expense", post(create_expense))
        .route(
            "/organizations/{org_id}/transactions/{transaction_id}",
            get(get_transaction).delete(delete_transaction),
        )
        .route(
            "/organizations/{org_id}/transactions/{transaction_id}/restore",
            post(restore_transaction),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// Request body for a payment into the payer's own ledger.
#[derive(Debug, Deserialize)]
pub struct CreateIncomeRequest {
    /// The paying payer.
    pub payer_id: PayerId,
    /// Amount paid.
    pub amount: String,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Description.
    pub description: Option<String>,
}

/// One payee share of a multi-payee payment.
#[derive(Debug, Deserialize)]
pub struct PayeeShareRequest {
    /// Payee.
    pub payee_id: PayerId,
    /// Amount; zero shares are ignored.
    pub amount: String,
}

/// Request body for a payment split across payees.
#[derive(Debug, Deserialize)]
pub struct CreateMultiPayeeRequest {
    /// The payment maker.
    pub payer_id: PayerId,
    /// Per-payee shares.
    pub payee_payments: Vec<PayeeShareRequest>,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Description.
    pub description: Option<String>,
}

/// Request body for a guardian lump payment.
#[derive(Debug, Deserialize)]
pub struct CreateGuardianPaymentRequest {
    /// The paying guardian.
    pub guardian_id: PayerId,
    /// Lump amount.
    pub amount: String,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Description.
    pub description: Option<String>,
}

/// Request body for an expense.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    /// Amount paid out.
    pub amount: String,
    /// Payer to invoice for the expense.
    pub charged_to: Option<PayerId>,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
    /// Description.
    pub description: Option<String>,
}

/// Response for an expense.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    /// The expense transaction.
    pub transaction: TransactionResponse,
    /// Debit issued to the charged payer.
    pub charge_receipt: Option<ReceiptResponse>,
    /// Credit applied to that debit.
    pub credit_application: CreditApplicationResponse,
}

/// Response for a transaction page.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    /// Transactions, newest first.
    pub data: Vec<TransactionResponse>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/organizations/{org_id}/transactions/income` - Payer pays their own debts.
async fn create_income(
    State(state): State<AppState>,
    Path(org_id): Path<OrganizationId>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateIncomeRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let amount = parse_amount(&payload.amount, currency)?;

    let result = state
        .ledger
        .create_income_transaction(IncomePayment {
            organization_id: org_id,
            payer_id: payload.payer_id,
            amount,
            academy_id: payload.academy_id,
            method: payload.method,
            handled_by,
            description: payload.description,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentResponse::from_distribution(&result, currency)),
    ))
}

/// POST `/organizations/{org_id}/transactions/multi-payee` - One payment, several payees.
async fn create_multi_payee(
    State(state): State<AppState>,
    Path(org_id): Path<OrganizationId>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateMultiPayeeRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let payee_payments = payload
        .payee_payments
        .iter()
        .map(|share| {
            Ok(PayeePayment {
                payee_id: share.payee_id,
                amount: parse_share(&share.amount, currency)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let result = state
        .ledger
        .create_multi_payee_payment_transaction(PaymentRequest {
            organization_id: org_id,
            payer_id: payload.payer_id,
            payee_payments,
            academy_id: payload.academy_id,
            method: payload.method,
            handled_by,
            description: payload.description,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentResponse::from_distribution(&result, currency)),
    ))
}

/// POST `/organizations/{org_id}/transactions/guardian` - Lump payment across linked payees.
async fn create_guardian_payment(
    State(state): State<AppState>,
    Path(org_id): Path<OrganizationId>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateGuardianPaymentRequest>,
) -> Result<(StatusCode, Json<GuardianPaymentResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let amount = parse_amount(&payload.amount, currency)?;

    let result = state
        .ledger
        .create_guardian_payment_transaction(GuardianPayment {
            organization_id: org_id,
            guardian_id: payload.guardian_id,
            amount,
            academy_id: payload.academy_id,
            method: payload.method,
            handled_by,
            description: payload.description,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GuardianPaymentResponse::from_distribution(&result, currency)),
    ))
}

/// POST `/organizations/{org_id}/transactions/expense` - Organization outflow.
async fn create_expense(
    State(state): State<AppState>,
    Path(org_id): Path<OrganizationId>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let amount = parse_amount(&payload.amount, currency)?;

    let result = state
        .ledger
        .create_expense_transaction(NewExpense {
            organization_id: org_id,
            amount,
            charged_to: payload.charged_to,
            academy_id: payload.academy_id,
            method: payload.method,
            handled_by,
            description: payload.description,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseResponse {
            transaction: TransactionResponse::from_transaction(&result.transaction, currency),
            charge_receipt: result
                .charge_receipt
                .as_ref()
                .map(|r| ReceiptResponse::from_receipt(r, currency)),
            credit_application: CreditApplicationResponse::from_status(
                &result.credit_application,
                currency,
            ),
        }),
    ))
}

/// GET `/organizations/{org_id}/transactions` - List transactions, newest first.
async fn list_transactions(
    State(state): State<AppState>,
    Path(org_id): Path<OrganizationId>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let page = PageRequest::new(
        query.page.unwrap_or(1),
        query
            .per_page
            .unwrap_or(state.ledger.settings().default_page_size),
    );

    let result = state
        .ledger
        .list_transactions(org_id, page)
        .await?
        .map(|t| TransactionResponse::from_transaction(&t, currency));
    Ok(Json(TransactionListResponse {
        data: result.data,
        meta: result.meta,
    }))
}

/// GET `/organizations/{org_id}/transactions/{transaction_id}` - Get a transaction.
async fn get_transaction(
    State(state): State<AppState>,
    Path((org_id, transaction_id)): Path<(OrganizationId, TransactionId)>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let txn = state.ledger.get_transaction(org_id, transaction_id).await?;
    Ok(Json(TransactionResponse::from_transaction(&txn, currency)))
}

/// DELETE `/organizations/{org_id}/transactions/{transaction_id}` - Soft delete.
async fn delete_transaction(
    State(state): State<AppState>,
    Path((org_id, transaction_id)): Path<(OrganizationId, TransactionId)>,
    ActorId(actor): ActorId,
) -> Result<Json<StateChangeResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let summary = state
        .ledger
        .soft_delete_transaction(org_id, transaction_id, actor)
        .await?;
    Ok(Json(StateChangeResponse::from_deletion(&summary, currency)))
}

/// POST `/organizations/{org_id}/transactions/{transaction_id}/restore` - Undo a soft delete.
async fn restore_transaction(
    State(state): State<AppState>,
    Path((org_id, transaction_id)): Path<(OrganizationId, TransactionId)>,
    ActorId(actor): ActorId,
) -> Result<Json<StateChangeResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let summary = state
        .ledger
        .restore_transaction(org_id, transaction_id, actor)
        .await?;
    Ok(Json(StateChangeResponse::from_restore(&summary, currency)))
}
