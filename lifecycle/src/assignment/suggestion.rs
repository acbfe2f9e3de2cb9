//! Triage suggestions
//!
//! A [`SuggestionProvider`] proposes an engineer role, priority, severity
//! and concrete engineers for an untriaged ticket. Fetching a suggestion is
//! read-only; accepting one goes through the normal assignment path.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SuggestionConfig;
use crate::error::{TicketError, TicketResult};
use crate::model::{Priority, Role, Severity, Ticket, User, UserId};

/// A proposed triage decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub engineer_role: Role,
    pub priority: Priority,
    pub severity: Severity,
    pub engineer_ids: Vec<UserId>,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub rationale: String,
}

/// An assignable engineer and how many open tickets they hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user: User,
    pub open_tickets: usize,
}

/// Input handed to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub ticket: Ticket,
    pub candidates: Vec<Candidate>,
}

/// Source of triage suggestions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn suggest(&self, request: &SuggestionRequest) -> TicketResult<Suggestion>;
}

pub type SharedSuggestionProvider = Arc<dyn SuggestionProvider>;

/// Table-driven provider: category picks the engineer role, severity hints
/// the priority, the least-loaded engineers of that role are proposed.
pub struct RuleBasedProvider {
    config: SuggestionConfig,
}

impl RuleBasedProvider {
    pub fn new(config: SuggestionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SuggestionProvider for RuleBasedProvider {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn suggest(&self, request: &SuggestionRequest) -> TicketResult<Suggestion> {
        let ticket = &request.ticket;
        let role = self.config.role_for(ticket.category);
        let priority = self.config.priority_for(ticket.severity).max(ticket.priority);
        let limit = self.config.max_engineers.max(1);

        let mut matching: Vec<&Candidate> = request
            .candidates
            .iter()
            .filter(|c| c.user.role == role)
            .collect();
        let (pool, confidence, rationale) = if matching.is_empty() {
            matching = request.candidates.iter().collect();
            (
                matching,
                0.4,
                format!(
                    "{} is usually handled by a {}, none available; proposing least-loaded engineers",
                    ticket.category, role
                ),
            )
        } else {
            (
                matching,
                0.8,
                format!("{} is handled by {} engineers", ticket.category, role),
            )
        };

        let mut pool = pool;
        pool.sort_by(|a, b| {
            a.open_tickets
                .cmp(&b.open_tickets)
                .then_with(|| a.user.id.cmp(&b.user.id))
        });
        let engineer_ids: Vec<UserId> = pool.iter().take(limit).map(|c| c.user.id.clone()).collect();

        debug!(
            ticket_id = %ticket.id,
            role = %role,
            engineers = engineer_ids.len(),
            "Rule-based suggestion"
        );

        Ok(Suggestion {
            engineer_role: role,
            priority,
            severity: ticket.severity,
            confidence: if engineer_ids.is_empty() { 0.0 } else { confidence },
            engineer_ids,
            rationale,
        })
    }
}

/// Provider backed by an external classifier reached over HTTP.
///
/// POSTs the [`SuggestionRequest`] as JSON and expects a [`Suggestion`].
pub struct HttpSuggestionProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpSuggestionProvider {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> TicketResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TicketError::Suggestion {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl SuggestionProvider for HttpSuggestionProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn suggest(&self, request: &SuggestionRequest) -> TicketResult<Suggestion> {
        let failed = |e: reqwest::Error| TicketError::Suggestion {
            message: e.to_string(),
        };
        let suggestion: Suggestion = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        if !(0.0..=1.0).contains(&suggestion.confidence) {
            return Err(TicketError::Suggestion {
                message: format!("confidence {} out of range", suggestion.confidence),
            });
        }
        Ok(suggestion)
    }
}

/// Build the configured provider
pub fn provider_from_config(config: &SuggestionConfig) -> TicketResult<SharedSuggestionProvider> {
    match (config.provider, &config.url) {
        (crate::config::ProviderKind::Http, Some(url)) => {
            Ok(Arc::new(HttpSuggestionProvider::new(url.clone(), config.timeout())?))
        }
        (crate::config::ProviderKind::Http, None) => Err(TicketError::Suggestion {
            message: "http provider configured without url".into(),
        }),
        (crate::config::ProviderKind::Rules, _) => {
            Ok(Arc::new(RuleBasedProvider::new(config.clone())))
        }
    }
}
