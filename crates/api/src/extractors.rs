//! Request header extractors.

use axum::{extract::FromRequestParts, http::request::Parts};

use clubledger_shared::types::UserId;

use crate::ApiError;

/// Header naming the staff member performing a mutation.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Header carrying a client idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// The acting user, taken from the `X-Actor-Id` header.
///
/// ```ignore
/// async fn handler(ActorId(actor): ActorId) -> impl IntoResponse {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActorId(pub UserId);

impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("missing_actor", "X-Actor-Id header is required"))?;
        raw.trim()
            .parse::<UserId>()
            .map(ActorId)
            .map_err(|_| ApiError::bad_request("invalid_actor", "X-Actor-Id must be a UUID"))
    }
}

/// Optional acting user; absent when the header is missing.
#[derive(Debug, Clone, Copy)]
pub struct HandledBy(pub Option<UserId>);

impl<S> FromRequestParts<S> for HandledBy
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(ACTOR_HEADER) {
            let ActorId(actor) = ActorId::from_request_parts(parts, state).await?;
            Ok(Self(Some(actor)))
        } else {
            Ok(Self(None))
        }
    }
}

/// Client idempotency key from the `Idempotency-Key` header.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(IDEMPOTENCY_HEADER) else {
            return Ok(Self(None));
        };
        let key = value
            .to_str()
            .map_err(|_| ApiError::bad_request("invalid_idempotency_key", "Idempotency-Key must be ASCII"))?
            .trim();
        if key.is_empty() || key.len() > 255 {
            return Err(ApiError::bad_request(
                "invalid_idempotency_key",
                "Idempotency-Key must be 1 to 255 characters",
            ));
        }
        Ok(Self(Some(key.to_string())))
    }
}
