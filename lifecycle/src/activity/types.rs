//! Activity log entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::model::{Actor, TicketId};
use crate::state_machine::TransitionRecord;

/// Kind of audited change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Creation,
    StatusChange,
    PriorityChange,
    Assignment,
    Comment,
    Resolution,
    Reopened,
    AttachmentAdded,
    Feedback,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "CREATION",
            Self::StatusChange => "STATUS_CHANGE",
            Self::PriorityChange => "PRIORITY_CHANGE",
            Self::Assignment => "ASSIGNMENT",
            Self::Comment => "COMMENT",
            Self::Resolution => "RESOLUTION",
            Self::Reopened => "REOPENED",
            Self::AttachmentAdded => "ATTACHMENT_ADDED",
            Self::Feedback => "FEEDBACK",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record. `sequence` is the authoritative order;
/// `timestamp` is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub ticket_id: TicketId,
    pub sequence: u64,
    pub actor: Actor,
    pub activity_type: ActivityType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub internal_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionRecord>,
}

/// Default page size for log queries
pub const DEFAULT_PAGE_LIMIT: usize = 50;
/// Upper bound on page size
pub const MAX_PAGE_LIMIT: usize = 500;

/// Offset/limit request for paged listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Requested limit clamped to `1..=MAX_PAGE_LIMIT`
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }
}

/// One page of results plus the total count before paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice `all` according to `request`
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let offset = request.offset();
        let limit = request.limit();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self {
            items,
            offset,
            limit,
            total,
        }
    }
}
