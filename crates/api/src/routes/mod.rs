//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod health;
pub mod payers;
pub mod transactions;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(payers::routes())
        .merge(transactions::routes())
}

/// Currency every amount of an organization is expressed in.
pub(crate) async fn org_currency(
    state: &AppState,
    organization_id: clubledger_shared::types::OrganizationId,
) -> Result<clubledger_shared::types::Currency, crate::ApiError> {
    Ok(state
        .ledger
        .organization_settings(organization_id)
        .await?
        .currency)
}
