//! Ticket aggregate and its closed vocabularies

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::actor::UserId;
use crate::sla::SlaClock;
use crate::state_machine::TicketStatus;

/// Ticket UID (`TKT` followed by digits)
pub type TicketId = String;

/// Render the UID for the n-th ticket
pub fn format_ticket_id(number: u64) -> TicketId {
    format!("TKT{:05}", number)
}

/// Whether a string looks like a ticket UID
pub fn is_valid_ticket_id(id: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^TKT\d{3,}$").expect("static ticket id pattern"))
        .is_match(id)
}

/// Business priority; drives the SLA duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn all() -> &'static [Priority] {
        &[
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ]
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Technical impact, set during triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Trivial,
    Minor,
    Major,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Minor
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trivial => write!(f, "TRIVIAL"),
            Self::Minor => write!(f, "MINOR"),
            Self::Major => write!(f, "MAJOR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Issue category offered by the ticket forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    NetworkConnectivity,
    EmailServices,
    Hardware,
    NetworkSecurity,
    NetworkPerformance,
    Other,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::NetworkConnectivity,
            Category::EmailServices,
            Category::Hardware,
            Category::NetworkSecurity,
            Category::NetworkPerformance,
            Category::Other,
        ]
    }

    /// Human label shown by the client
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkConnectivity => "Network Connectivity",
            Self::EmailServices => "Email Services",
            Self::Hardware => "Hardware",
            Self::NetworkSecurity => "Network Security",
            Self::NetworkPerformance => "Network Performance",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Customer rating attached after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// 1 (poor) to 5 (excellent)
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
}

/// Reference to a file stored elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub name: String,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
}

/// A support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub priority: Priority,
    pub severity: Severity,
    pub status: TicketStatus,
    /// Customer or agent who submitted the ticket
    pub created_by: UserId,
    /// Customer the ticket is for (differs from `created_by` for agent-raised tickets)
    pub customer_id: UserId,
    pub assignees: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sla: SlaClock,
    pub resolved_at: Option<DateTime<Utc>>,
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Set once the ticket has been sent for on-site work
    #[serde(default)]
    pub field_dispatch: bool,
    /// Sequence number of the last activity log entry
    pub log_sequence: u64,
    /// Timestamp of the last activity log entry
    pub last_activity_at: DateTime<Utc>,
}

impl Ticket {
    /// Whether `user_id` raised the ticket or is the customer it was raised for
    pub fn is_requester(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.customer_id == user_id
    }

    pub fn is_assignee(&self, user_id: &str) -> bool {
        self.assignees.iter().any(|a| a == user_id)
    }

    /// Waiting for a triage decision with nobody on it yet
    pub fn is_untriaged(&self) -> bool {
        self.status.awaits_triage() && self.assignees.is_empty()
    }

    /// Replace the assignee set, dropping duplicates but keeping request order
    pub fn set_assignees<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        let mut next: Vec<UserId> = Vec::new();
        for id in ids {
            let id = id.into();
            if !next.contains(&id) {
                next.push(id);
            }
        }
        self.assignees = next;
    }

    /// Whether status and assignees agree
    pub fn assignees_consistent(&self) -> bool {
        !self.status.requires_assignees() || !self.assignees.is_empty()
    }
}
