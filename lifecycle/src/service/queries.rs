//! Read-only ticket listings

use chrono::Duration;

use super::triage::awaiting_decision;
use super::{traced, TicketFilter, TicketService};
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Role, Team, Ticket};

impl TicketService {
    /// Work queue: the triage queue for triage officers, open assigned
    /// tickets for engineers. Most urgent deadline first.
    pub async fn pending(&self, actor: &Actor) -> TicketResult<Vec<Ticket>> {
        traced("pending", None, actor, async {
            let mut tickets: Vec<Ticket> = match actor.role {
                Role::TriageOfficer => self
                    .store
                    .list_tickets()?
                    .into_iter()
                    .filter(awaiting_decision)
                    .collect(),
                role if role.is_engineer() => self
                    .store
                    .list_tickets()?
                    .into_iter()
                    .filter(|t| t.status.is_open() && t.is_assignee(&actor.user_id))
                    .collect(),
                role => return Err(TicketError::forbidden(role, "view a work queue")),
            };
            tickets.sort_by(|a, b| a.sla.deadline.cmp(&b.sla.deadline).then_with(|| a.id.cmp(&b.id)));
            Ok(tickets)
        })
        .await
    }

    /// Tickets the caller raised (or that were raised for them), or holds.
    pub async fn my_tickets(&self, actor: &Actor) -> TicketResult<Vec<Ticket>> {
        traced("my_tickets", None, actor, async {
            let requester = actor.role.is_requester();
            if !requester && !actor.role.is_engineer() {
                return Err(TicketError::forbidden(actor.role, "list own tickets"));
            }
            let mut tickets: Vec<Ticket> = self
                .store
                .list_tickets()?
                .into_iter()
                .filter(|t| {
                    if requester {
                        t.is_requester(&actor.user_id)
                    } else {
                        t.is_assignee(&actor.user_id)
                    }
                })
                .collect();
            tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(tickets)
        })
        .await
    }

    /// Open tickets held by engineers of the lead's team
    pub async fn team_active(&self, actor: &Actor) -> TicketResult<Vec<Ticket>> {
        traced("team_active", None, actor, async {
            let team = self.lead_team(actor)?;
            self.team_open_tickets(&team)
        })
        .await
    }

    /// Team tickets at risk or already breached; `threshold` defaults to the
    /// configured at-risk window.
    pub async fn team_sla_risk(
        &self,
        actor: &Actor,
        threshold: Option<Duration>,
    ) -> TicketResult<Vec<Ticket>> {
        traced("team_sla_risk", None, actor, async {
            let team = self.lead_team(actor)?;
            let threshold = threshold.unwrap_or_else(|| self.config.sla.at_risk_threshold());
            if threshold <= Duration::zero() {
                return Err(TicketError::invalid("threshold must be positive"));
            }
            let now = self.clock.now();
            Ok(self
                .team_open_tickets(&team)?
                .into_iter()
                .filter(|t| t.sla.at_risk(now, threshold) || t.sla.is_breached(now))
                .collect())
        })
        .await
    }

    /// Organisation-wide listing for managers and executives
    pub async fn all_tickets(&self, actor: &Actor, filter: TicketFilter) -> TicketResult<Vec<Ticket>> {
        traced("all_tickets", None, actor, async {
            if !self.authorizer.can_view_all(actor.role) {
                return Err(TicketError::forbidden(actor.role, "view all tickets"));
            }
            let team = match filter.team_id.as_deref() {
                Some(lead_id) => Some(self.store.get_team(lead_id)?.ok_or_else(|| {
                    TicketError::NotFound {
                        kind: "Team",
                        id: lead_id.to_string(),
                    }
                })?),
                None => None,
            };

            let now = self.clock.now();
            let threshold = self.config.sla.at_risk_threshold();
            let mut tickets: Vec<Ticket> = self
                .store
                .list_tickets()?
                .into_iter()
                .filter(|t| filter.status.map_or(true, |s| t.status == s))
                .filter(|t| {
                    team.as_ref()
                        .map_or(true, |team| t.assignees.iter().any(|a| team.is_member(a)))
                })
                .filter(|t| !filter.sla_at_risk || (t.status.is_open() && t.sla.at_risk(now, threshold)))
                .filter(|t| !filter.sla_breached || t.sla.breached || t.sla.is_breached(now))
                .collect();
            tickets.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(tickets)
        })
        .await
    }

    pub(super) fn lead_team(&self, actor: &Actor) -> TicketResult<Team> {
        if actor.role != Role::TeamLead {
            return Err(TicketError::forbidden(actor.role, "view team tickets"));
        }
        self.store
            .get_team(&actor.user_id)?
            .ok_or_else(|| TicketError::TeamNotConfigured {
                lead_id: actor.user_id.clone(),
            })
    }

    fn team_open_tickets(&self, team: &Team) -> TicketResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .store
            .list_tickets()?
            .into_iter()
            .filter(|t| t.status.is_open() && t.assignees.iter().any(|a| team.is_member(a)))
            .collect();
        tickets.sort_by(|a, b| a.sla.deadline.cmp(&b.sla.deadline).then_with(|| a.id.cmp(&b.id)));
        Ok(tickets)
    }
}
