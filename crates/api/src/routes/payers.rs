//! Per-payer receipt and balance routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clubledger_core::ledger::PaymentMethod;
use clubledger_core::receipt::ProductInfo;
use clubledger_core::service::{NewCredit, NewDebit};
use clubledger_shared::types::{
    AcademyId, Amount, OrganizationId, PayerId, ReceiptId, TransactionId,
};

use super::org_currency;
use crate::extractors::{HandledBy, IdempotencyKey};
use crate::response::{
    BalanceResponse, CachedBalanceResponse, CreditApplicationResponse, ReceiptResponse,
    TransactionResponse, money, parse_amount,
};
use crate::{ApiError, AppState};

/// Creates the payer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/organizations/{org_id}/payers/{payer_id}/debits", post(create_debit))
        .route("/organizations/{org_id}/payers/{payer_id}/credits", post(create_credit))
        .route("/organizations/{org_id}/payers/{payer_id}/balance", get(get_balance))
        .route(
            "/organizations/{org_id}/payers/{payer_id}/balance/refresh",
            post(refresh_balance),
        )
        .route("/organizations/{org_id}/payers/{payer_id}/receipts", get(list_receipts))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Product details of an invoice.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    /// Product name.
    pub name: String,
    /// Catalog price; defaults to the invoiced amount.
    pub price: Option<String>,
    /// Invoice date; defaults to today.
    pub invoice_date: Option<NaiveDate>,
    /// Payment deadline.
    pub deadline: Option<NaiveDate>,
}

/// Request body for issuing a debit.
#[derive(Debug, Deserialize)]
pub struct CreateDebitRequest {
    /// Amount owed.
    pub amount: String,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Product details.
    pub product: Option<ProductRequest>,
    /// Description.
    pub description: Option<String>,
}

/// Request body for recording a credit.
#[derive(Debug, Deserialize)]
pub struct CreateCreditRequest {
    /// Credit amount.
    pub amount: String,
    /// Academy.
    pub academy_id: Option<AcademyId>,
    /// Existing income transaction to attach to.
    pub parent_transaction_id: Option<TransactionId>,
    /// Debit to apply the credit to.
    pub sibling_debit_id: Option<ReceiptId>,
    /// Description.
    pub description: Option<String>,
    /// Payment method.
    pub method: Option<PaymentMethod>,
}

/// Query parameters for listing receipts.
#[derive(Debug, Default, Deserialize)]
pub struct ListReceiptsQuery {
    /// Include soft-deleted receipts.
    #[serde(default)]
    pub include_deleted: bool,
}

/// Response for an issued debit.
#[derive(Debug, Serialize)]
pub struct DebitResponse {
    /// The invoice transaction.
    pub transaction: TransactionResponse,
    /// The debit receipt.
    pub receipt: ReceiptResponse,
    /// What happened to the payer's unconsumed credit.
    pub credit_application: CreditApplicationResponse,
}

/// Response for a recorded credit.
#[derive(Debug, Serialize)]
pub struct CreditResponse {
    /// The owning transaction.
    pub transaction: TransactionResponse,
    /// The credit receipt.
    pub receipt: ReceiptResponse,
    /// Part applied to the sibling debit.
    pub applied_to_debit: String,
}

/// Response for a receipt list.
#[derive(Debug, Serialize)]
pub struct ReceiptListResponse {
    /// Receipts, oldest first.
    pub receipts: Vec<ReceiptResponse>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/organizations/{org_id}/payers/{payer_id}/debits` - Issue an invoice.
async fn create_debit(
    State(state): State<AppState>,
    Path((org_id, payer_id)): Path<(OrganizationId, PayerId)>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateDebitRequest>,
) -> Result<(StatusCode, Json<DebitResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let amount = parse_amount(&payload.amount, currency)?;
    let product = payload
        .product
        .map(|p| product_info(p, amount, currency))
        .transpose()?;

    let result = state
        .ledger
        .create_debit_receipt(NewDebit {
            organization_id: org_id,
            payer_id,
            academy_id: payload.academy_id,
            amount,
            product,
            description: payload.description,
            handled_by,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DebitResponse {
            transaction: TransactionResponse::from_transaction(&result.transaction, currency),
            receipt: ReceiptResponse::from_receipt(&result.receipt, currency),
            credit_application: CreditApplicationResponse::from_status(
                &result.credit_application,
                currency,
            ),
        }),
    ))
}

fn product_info(
    product: ProductRequest,
    amount: Amount,
    currency: clubledger_shared::types::Currency,
) -> Result<ProductInfo, ApiError> {
    let price = match product.price.as_deref() {
        Some(raw) => parse_amount(raw, currency)?,
        None => amount,
    };
    Ok(ProductInfo {
        name: product.name,
        price,
        invoice_date: product
            .invoice_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        deadline: product.deadline,
    })
}

/// POST `/organizations/{org_id}/payers/{payer_id}/credits` - Record a credit.
async fn create_credit(
    State(state): State<AppState>,
    Path((org_id, payer_id)): Path<(OrganizationId, PayerId)>,
    HandledBy(handled_by): HandledBy,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<CreateCreditRequest>,
) -> Result<(StatusCode, Json<CreditResponse>), ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let amount = parse_amount(&payload.amount, currency)?;

    let result = state
        .ledger
        .create_credit_receipt(NewCredit {
            organization_id: org_id,
            payer_id,
            academy_id: payload.academy_id,
            amount,
            parent_transaction_id: payload.parent_transaction_id,
            sibling_debit_id: payload.sibling_debit_id,
            description: payload.description,
            method: payload.method,
            handled_by,
            idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreditResponse {
            transaction: TransactionResponse::from_transaction(&result.transaction, currency),
            receipt: ReceiptResponse::from_receipt(&result.receipt, currency),
            applied_to_debit: money(result.applied_to_debit, currency),
        }),
    ))
}

/// GET `/organizations/{org_id}/payers/{payer_id}/balance` - Live balance and cache row.
async fn get_balance(
    State(state): State<AppState>,
    Path((org_id, payer_id)): Path<(OrganizationId, PayerId)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let snapshot = state
        .ledger
        .compute_outstanding_balance(org_id, payer_id)
        .await?;
    let cached = state.ledger.get_cached_balance(org_id, payer_id).await?;
    Ok(Json(BalanceResponse::new(&snapshot, cached.as_ref(), currency)))
}

/// POST `/organizations/{org_id}/payers/{payer_id}/balance/refresh` - Rewrite the cache row.
async fn refresh_balance(
    State(state): State<AppState>,
    Path((org_id, payer_id)): Path<(OrganizationId, PayerId)>,
) -> Result<Json<CachedBalanceResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let balance = state.ledger.refresh_balance_cache(org_id, payer_id).await?;
    Ok(Json(CachedBalanceResponse::from_balance(&balance, currency)))
}

/// GET `/organizations/{org_id}/payers/{payer_id}/receipts` - List receipts.
async fn list_receipts(
    State(state): State<AppState>,
    Path((org_id, payer_id)): Path<(OrganizationId, PayerId)>,
    Query(query): Query<ListReceiptsQuery>,
) -> Result<Json<ReceiptListResponse>, ApiError> {
    let currency = org_currency(&state, org_id).await?;
    let receipts = state
        .ledger
        .list_receipts(org_id, payer_id, query.include_deleted)
        .await?;
    Ok(Json(ReceiptListResponse {
        receipts: receipts
            .iter()
            .map(|r| ReceiptResponse::from_receipt(r, currency))
            .collect(),
    }))
}
