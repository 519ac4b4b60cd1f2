//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use clubledger_core::ledger::LedgerError;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// A ledger operation failed.
    Ledger(LedgerError),
    /// The request itself is malformed.
    BadRequest {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
}

impl ApiError {
    /// Creates a bad request error.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest { code, message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": code, "message": message })),
            )
                .into_response(),
            Self::Ledger(err) => {
                let status = StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

                if status.is_server_error() {
                    error!(error = %err, "Ledger operation failed");
                    return (
                        status,
                        Json(json!({
                            "error": err.error_code(),
                            "message": "An error occurred"
                        })),
                    )
                        .into_response();
                }

                let body = match &err {
                    LedgerError::PartialFailure(failures) => json!({
                        "error": err.error_code(),
                        "message": err.to_string(),
                        "details": failures,
                    }),
                    _ => json!({
                        "error": err.error_code(),
                        "message": err.to_string(),
                        "retryable": err.is_retryable(),
                    }),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}
