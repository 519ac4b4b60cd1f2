//! HTTP API layer with Axum routes over the ledger service.
//!
//! This crate provides:
//! - REST API routes for receipts, payments and transactions
//! - Header extractors for the acting user and idempotency keys
//! - Error and response types with decimal amounts

pub mod error;
pub mod extractors;
pub mod response;
pub mod routes;

use axum::Router;
use axum::http::HeaderName;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use clubledger_core::service::LedgerService;

pub use error::ApiError;

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger service every route delegates to.
    pub ledger: Arc<LedgerService>,
}

impl AppState {
    /// Wraps a ledger service.
    #[must_use]
    pub fn new(ledger: LedgerService) -> Self {
        Self {
            ledger: Arc::new(ledger),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
