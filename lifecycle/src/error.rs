//! Ticket engine error types
//!
//! Every service operation returns [`TicketResult`]. Authorization and
//! validation failures are returned to the caller unmodified; storage
//! failures abort the whole operation and are reported as retryable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Role, TicketStatus};
use crate::store::StoreError;

/// Result type alias for ticket engine operations
pub type TicketResult<T> = Result<T, TicketError>;

/// Errors that can occur during ticket lifecycle operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TicketError {
    /// The requested status is not reachable from the current one
    #[error("Invalid transition: {from} → {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    /// The actor's role may not perform this transition
    #[error("Role {role} is not permitted to move a ticket from {from} to {to}")]
    UnauthorizedTransition {
        role: Role,
        from: TicketStatus,
        to: TicketStatus,
    },

    /// The actor's role may not perform a non-transition action
    #[error("Role {role} is not permitted to {action}")]
    Forbidden { role: Role, action: String },

    /// An assignment was requested with no engineers
    #[error("Assignment requires at least one engineer")]
    EmptyAssignment,

    /// The engineer id is unknown, inactive, or not assignable by this actor
    #[error("Unknown or unassignable engineer: {engineer_id}")]
    UnknownEngineer { engineer_id: String },

    /// A team lead acted on a team-scoped operation without a team
    #[error("Team lead {lead_id} has no team configured")]
    TeamNotConfigured { lead_id: String },

    /// Another triage officer already triaged this ticket
    #[error("Ticket {ticket_id} was already triaged (status {status})")]
    AlreadyTriaged {
        ticket_id: String,
        status: TicketStatus,
    },

    /// Persistence failure; the operation had no effect and may be retried
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Unknown ticket, team or user
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Request failed validation (bad rating, empty title, reused idempotency key, ...)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The AI suggestion provider failed or returned garbage
    #[error("Suggestion provider error: {message}")]
    Suggestion { message: String },
}

impl TicketError {
    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::UnauthorizedTransition { .. } => ErrorCode::UnauthorizedTransition,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::EmptyAssignment => ErrorCode::EmptyAssignment,
            Self::UnknownEngineer { .. } => ErrorCode::UnknownEngineer,
            Self::TeamNotConfigured { .. } => ErrorCode::TeamNotConfigured,
            Self::AlreadyTriaged { .. } => ErrorCode::AlreadyTriaged,
            Self::Storage { .. } => ErrorCode::Storage,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Suggestion { .. } => ErrorCode::Suggestion,
        }
    }

    /// Whether the caller should retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Suggestion { .. })
    }

    pub(crate) fn forbidden(role: Role, action: impl Into<String>) -> Self {
        Self::Forbidden {
            role,
            action: action.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub(crate) fn ticket_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "Ticket",
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for TicketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound {
                kind: "Record",
                id: key,
            },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Stable error kinds surfaced to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidTransition,
    UnauthorizedTransition,
    Forbidden,
    EmptyAssignment,
    UnknownEngineer,
    TeamNotConfigured,
    AlreadyTriaged,
    Storage,
    NotFound,
    InvalidRequest,
    Suggestion,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::UnauthorizedTransition => "UNAUTHORIZED_TRANSITION",
            Self::Forbidden => "FORBIDDEN",
            Self::EmptyAssignment => "EMPTY_ASSIGNMENT",
            Self::UnknownEngineer => "UNKNOWN_ENGINEER",
            Self::TeamNotConfigured => "TEAM_NOT_CONFIGURED",
            Self::AlreadyTriaged => "ALREADY_TRIAGED",
            Self::Storage => "STORAGE",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Suggestion => "SUGGESTION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
