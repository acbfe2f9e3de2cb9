//! Triage, suggestions, priority changes and reassignment

use chrono::{DateTime, Utc};
use tracing::{info, Instrument};

use super::{traced, AcceptSuggestion, TicketService, TriageRequest};
use crate::activity::{ActivityRecorder, ActivityType};
use crate::assignment::{Candidate, Suggestion, SuggestionRequest};
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Priority, Role, Severity, Team, Ticket, TicketStatus, User, UserId};
use crate::otel;

impl TicketService {
    /// Apply a manual triage decision.
    ///
    /// Ends in `ASSIGNED` with the requested engineers, or in
    /// `AWAITING_FIELD` when `field_dispatch` is set.
    pub async fn triage(
        &self,
        ticket_id: &str,
        request: TriageRequest,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("triage", Some(ticket_id), actor, async {
            if !self.authorizer.can_triage(actor.role) {
                return Err(TicketError::forbidden(actor.role, "triage tickets"));
            }
            if request.field_dispatch && !request.engineer_ids.is_empty() {
                return Err(TicketError::invalid(
                    "field dispatch and engineer assignment are mutually exclusive",
                ));
            }

            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            if !awaiting_decision(&ticket) {
                return Err(already_triaged(&ticket));
            }

            let now = self.clock.now();
            let mut log = ActivityRecorder::new();
            self.apply_triage(&mut ticket, &request, actor, now, &mut log)?;
            if let Some(note) = request.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                log.record(&mut ticket, actor, ActivityType::Comment, note, true, now);
            }

            let ticket = self.commit(ticket, log, None)?;
            info!(
                ticket_id,
                status = %ticket.status,
                assignees = ?ticket.assignees,
                priority = %ticket.priority,
                "Ticket triaged"
            );
            Ok(ticket)
        })
        .await
    }

    /// Fetch a triage suggestion. Nothing is written.
    pub async fn suggest(&self, ticket_id: &str, actor: &Actor) -> TicketResult<Suggestion> {
        traced("suggest", Some(ticket_id), actor, async {
            if !self.authorizer.can_triage(actor.role) {
                return Err(TicketError::forbidden(actor.role, "request triage suggestions"));
            }
            let ticket = self.load(ticket_id)?;
            if !awaiting_decision(&ticket) {
                return Err(already_triaged(&ticket));
            }

            let candidates = self.candidates(&ticket)?;
            let request = SuggestionRequest { ticket, candidates };
            let span = otel::suggestion_span(ticket_id, self.suggestions.name());
            self.suggestions.suggest(&request).instrument(span).await
        })
        .await
    }

    /// Apply a (possibly edited) suggestion.
    ///
    /// Re-checks under the ticket lock that nobody triaged the ticket in the
    /// meantime; the loser of a race gets `AlreadyTriaged`.
    pub async fn accept_suggestion(
        &self,
        ticket_id: &str,
        accepted: AcceptSuggestion,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("accept_suggestion", Some(ticket_id), actor, async {
            if !self.authorizer.can_triage(actor.role) {
                return Err(TicketError::forbidden(actor.role, "accept triage suggestions"));
            }

            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            if !awaiting_decision(&ticket) {
                return Err(already_triaged(&ticket));
            }

            let request = TriageRequest {
                priority: accepted.priority,
                severity: accepted.severity,
                engineer_ids: accepted.engineer_ids,
                field_dispatch: false,
                note: None,
            };
            let now = self.clock.now();
            let mut log = ActivityRecorder::new();
            self.apply_triage(&mut ticket, &request, actor, now, &mut log)?;

            let ticket = self.commit(ticket, log, None)?;
            info!(ticket_id, assignees = ?ticket.assignees, "Suggestion accepted");
            Ok(ticket)
        })
        .await
    }

    /// Change priority and/or severity after triage. The SLA deadline is
    /// recomputed from the original start.
    pub async fn change_priority(
        &self,
        ticket_id: &str,
        priority: Option<Priority>,
        severity: Option<Severity>,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("change_priority", Some(ticket_id), actor, async {
            if !self.authorizer.can_retriage(actor.role) {
                return Err(TicketError::forbidden(actor.role, "change ticket priority"));
            }
            if priority.is_none() && severity.is_none() {
                return Err(TicketError::invalid("priority or severity is required"));
            }

            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            if !ticket.status.is_open() {
                return Err(TicketError::invalid(format!(
                    "priority cannot change on a {} ticket",
                    ticket.status
                )));
            }
            let _team_guard = if actor.role == Role::TeamLead {
                let guard = self.lock_team(&actor.user_id).await;
                self.require_team_ticket(actor, &ticket)?;
                Some(guard)
            } else {
                None
            };

            let now = self.clock.now();
            let mut log = ActivityRecorder::new();
            self.retriage(&mut ticket, priority, severity, actor, now, &mut log);
            if log.is_empty() {
                return Ok(ticket);
            }
            let ticket = self.commit(ticket, log, None)?;
            info!(ticket_id, priority = %ticket.priority, deadline = %ticket.sla.deadline, "Priority changed");
            Ok(ticket)
        })
        .await
    }

    /// Replace the engineers on a ticket that is being worked.
    ///
    /// Team leads may only move tickets held by their team, and only to
    /// members of it; membership is read under the team lock.
    pub async fn reassign(
        &self,
        ticket_id: &str,
        engineer_ids: Vec<UserId>,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("reassign", Some(ticket_id), actor, async {
            if !self.authorizer.can_assign(actor.role) {
                return Err(TicketError::forbidden(actor.role, "reassign tickets"));
            }

            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            if !ticket.status.requires_assignees() {
                return Err(TicketError::invalid(format!(
                    "only ASSIGNED, IN_PROGRESS or FIELD_VISIT_COMPLETE tickets can be reassigned (status {})",
                    ticket.status
                )));
            }

            let (_team_guard, team) = if actor.role == Role::TeamLead {
                let guard = self.lock_team(&actor.user_id).await;
                let team = self.require_team_ticket(actor, &ticket)?;
                (Some(guard), Some(team))
            } else {
                (None, None)
            };

            let ids =
                self.resolver
                    .validate(self.store.as_ref(), actor, &ticket, &engineer_ids, team.as_ref())?;
            if same_set(&ids, &ticket.assignees) {
                return Ok(ticket);
            }

            let mut log = ActivityRecorder::new();
            self.resolver
                .apply(&mut ticket, ids, actor, self.clock.now(), &mut log);
            let ticket = self.commit(ticket, log, None)?;
            info!(ticket_id, assignees = ?ticket.assignees, actor = %actor, "Ticket reassigned");
            Ok(ticket)
        })
        .await
    }

    /// Engineers the actor may choose from for this ticket
    pub async fn assignable_engineers(
        &self,
        ticket_id: &str,
        actor: &Actor,
    ) -> TicketResult<Vec<User>> {
        traced("assignable_engineers", Some(ticket_id), actor, async {
            let ticket = self.load(ticket_id)?;
            let team = if actor.role == Role::TeamLead {
                self.store.get_team(&actor.user_id)?
            } else {
                None
            };
            self.resolver
                .assignable_engineers(self.store.as_ref(), actor, &ticket, team.as_ref())
        })
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn apply_triage(
        &self,
        ticket: &mut Ticket,
        request: &TriageRequest,
        actor: &Actor,
        now: DateTime<Utc>,
        log: &mut ActivityRecorder,
    ) -> TicketResult<()> {
        self.retriage(ticket, request.priority, request.severity, actor, now, log);

        if request.field_dispatch {
            if ticket.status == TicketStatus::AwaitingField {
                return Ok(());
            }
            if ticket.status != TicketStatus::NeedsTriaging {
                self.machine
                    .transition(ticket, TicketStatus::NeedsTriaging, actor, now, log)?;
            }
            self.machine
                .transition(ticket, TicketStatus::AwaitingField, actor, now, log)?;
            return Ok(());
        }

        let ids = self
            .resolver
            .validate(self.store.as_ref(), actor, ticket, &request.engineer_ids, None)?;
        self.resolver.apply(ticket, ids, actor, now, log);
        self.machine
            .transition(ticket, TicketStatus::Assigned, actor, now, log)?;
        Ok(())
    }

    /// Stage priority/severity changes; the SLA follows a priority change.
    fn retriage(
        &self,
        ticket: &mut Ticket,
        priority: Option<Priority>,
        severity: Option<Severity>,
        actor: &Actor,
        now: DateTime<Utc>,
        log: &mut ActivityRecorder,
    ) {
        if let Some(priority) = priority.filter(|p| *p != ticket.priority) {
            let previous = ticket.priority;
            ticket.priority = priority;
            ticket.sla.retriage(
                self.machine.policy().duration_for(priority, ticket.category),
                now,
                self.config.sla.at_risk_threshold(),
            );
            log.record(
                ticket,
                actor,
                ActivityType::PriorityChange,
                format!("Priority changed from {} to {} by {}", previous, priority, actor),
                false,
                now,
            );
        }
        if let Some(severity) = severity.filter(|s| *s != ticket.severity) {
            let previous = ticket.severity;
            ticket.severity = severity;
            log.record(
                ticket,
                actor,
                ActivityType::PriorityChange,
                format!("Severity changed from {} to {} by {}", previous, severity, actor),
                true,
                now,
            );
        }
    }

    /// The lead's team, provided one of its engineers holds the ticket.
    /// Caller must hold the team lock.
    pub(super) fn require_team_ticket(&self, lead: &Actor, ticket: &Ticket) -> TicketResult<Team> {
        let team = self
            .store
            .get_team(&lead.user_id)?
            .ok_or_else(|| TicketError::TeamNotConfigured {
                lead_id: lead.user_id.clone(),
            })?;
        if !ticket.assignees.iter().any(|a| team.is_member(a)) {
            return Err(TicketError::forbidden(
                lead.role,
                format!("manage {}, which is not held by their team", ticket.id),
            ));
        }
        Ok(team)
    }

    /// Active engineers with their current open-ticket load
    fn candidates(&self, ticket: &Ticket) -> TicketResult<Vec<Candidate>> {
        let tickets = self.store.list_tickets()?;
        let field_only = ticket.status == TicketStatus::AwaitingField;
        Ok(self
            .store
            .list_users()?
            .into_iter()
            .filter(|u| u.is_assignable())
            .filter(|u| !field_only || u.role == Role::FieldEngineer)
            .map(|user| {
                let open_tickets = tickets
                    .iter()
                    .filter(|t| t.status.is_open() && t.is_assignee(&user.id))
                    .count();
                Candidate { user, open_tickets }
            })
            .collect())
    }
}

/// In the triage queue or waiting for a field engineer
pub(super) fn awaiting_decision(ticket: &Ticket) -> bool {
    ticket.is_untriaged()
        || (ticket.status == TicketStatus::AwaitingField && ticket.assignees.is_empty())
}

fn already_triaged(ticket: &Ticket) -> TicketError {
    TicketError::AlreadyTriaged {
        ticket_id: ticket.id.clone(),
        status: ticket.status,
    }
}

fn same_set(a: &[UserId], b: &[UserId]) -> bool {
    a.len() == b.len() && a.iter().all(|id| b.contains(id))
}
