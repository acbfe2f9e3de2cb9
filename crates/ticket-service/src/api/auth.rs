//! Caller identity
//!
//! Token handling lives in front of this service. Requests arrive with the
//! authenticated user id in `X-User-Id`; the role comes from the directory.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use lifecycle::{Actor, ErrorCode};

use super::error::ApiError;
use super::AppStateArc;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// The resolved actor behind a request
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

#[async_trait]
impl FromRequestParts<AppStateArc> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppStateArc,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthenticated("missing X-User-Id header"))?;

        match state.service.resolve_actor(user_id) {
            Ok(actor) => Ok(Caller(actor)),
            Err(e) if e.code() == ErrorCode::NotFound => {
                Err(ApiError::unauthenticated(format!("unknown user {}", user_id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Optional `Idempotency-Key` header
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(Self(None)),
            Some(value) => value
                .to_str()
                .map(|v| Self(Some(v.to_string())))
                .map_err(|_| ApiError::bad_request("Idempotency-Key must be ASCII")),
        }
    }
}
