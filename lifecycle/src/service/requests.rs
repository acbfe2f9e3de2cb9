//! Request payloads accepted by the ticket service

use serde::{Deserialize, Serialize};

use crate::model::{Category, Priority, Severity, TicketStatus, UserId};

/// Longest accepted ticket title
pub const MAX_TITLE_LEN: usize = 200;

/// Customer or agent ticket submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Required when an agent raises the ticket on a customer's behalf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<UserId>,
    /// Names of files already uploaded elsewhere
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// Manual triage decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub engineer_ids: Vec<UserId>,
    /// Route to on-site work instead of assigning now
    #[serde(default)]
    pub field_dispatch: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// Acceptance of a (possibly edited) suggestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptSuggestion {
    pub engineer_ids: Vec<UserId>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Organisation-wide ticket listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    /// Lead id of the team whose engineers hold the ticket
    #[serde(default)]
    pub team_id: Option<UserId>,
    #[serde(default)]
    pub sla_at_risk: bool,
    #[serde(default)]
    pub sla_breached: bool,
    #[serde(default)]
    pub status: Option<TicketStatus>,
}
