//! HTTP error mapping
//!
//! Every engine error becomes a JSON body `{code, message, retryable}` with a
//! status chosen from its [`ErrorCode`]. Extractor rejections and request
//! timeouts use the same body.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use lifecycle::{ErrorCode, TicketError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// Missing or unknown `X-User-Id`
    #[error("Unauthenticated: {reason}")]
    Unauthenticated { reason: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Request timed out")]
    Timeout,

    /// Middleware failure outside any handler
    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Ticket(e) => status_for(e.code()),
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ticket(e) => e.code().as_str(),
            Self::Unauthenticated { .. } => "UNAUTHENTICATED",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Timeout => "TIMEOUT",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Ticket(e) => e.is_retryable(),
            Self::Timeout => true,
            _ => false,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Turn a middleware error (the request timeout) into a JSON response
pub async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::Timeout
    } else {
        ApiError::Internal {
            message: err.to_string(),
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidTransition | ErrorCode::AlreadyTriaged => StatusCode::CONFLICT,
        ErrorCode::UnauthorizedTransition | ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::EmptyAssignment | ErrorCode::UnknownEngineer | ErrorCode::InvalidRequest => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorCode::TeamNotConfigured | ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Storage => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Suggestion => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            retryable: self.retryable(),
        };
        (status, Json(body)).into_response()
    }
}
