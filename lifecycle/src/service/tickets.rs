//! Ticket creation, reads and requester/engineer mutations

use tracing::info;

use super::{non_empty, traced, NewTicket, TicketService, MAX_TITLE_LEN};
use crate::activity::{ActivityLogEntry, ActivityRecorder, ActivityType, Page, PageRequest};
use crate::authz::RoleAuthorizer;
use crate::error::{TicketError, TicketResult};
use crate::idempotency::{self, Replay};
use crate::model::{
    format_ticket_id, Actor, AttachmentRef, Feedback, Role, Ticket, TicketStatus,
};
use crate::sla::SlaClock;
use crate::state_machine::TransitionOutcome;
use crate::store::IdempotencyRecord;

impl TicketService {
    /// Raise a ticket. Customers raise for themselves; agents must name the
    /// customer. A repeated `idempotency_key` with the same request returns
    /// the original ticket.
    pub async fn create(
        &self,
        request: NewTicket,
        idempotency_key: Option<&str>,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("create", None, actor, async {
            if !self.authorizer.can_create(actor.role) {
                return Err(TicketError::forbidden(actor.role, "create tickets"));
            }
            let title = non_empty(&request.title, "title")?;
            if title.chars().count() > MAX_TITLE_LEN {
                return Err(TicketError::invalid(format!(
                    "title must be at most {} characters",
                    MAX_TITLE_LEN
                )));
            }
            let customer_id = self.customer_for(&request, actor)?;

            let mut replay_guard = None;
            let mut idempotency = None;
            if let Some(key) = idempotency_key {
                idempotency::validate_key(key)?;
                replay_guard = Some(self.locks.lock(&format!("idem:{}", key)).await);
                let fingerprint = idempotency::fingerprint(&actor.user_id, &request)?;
                match idempotency::check(self.store.idempotency(key)?.as_ref(), &fingerprint)? {
                    Replay::Existing(ticket_id) => {
                        info!(ticket_id = %ticket_id, key, "Idempotent replay of ticket creation");
                        return self.load(&ticket_id);
                    }
                    Replay::Fresh => idempotency = Some((key.to_string(), fingerprint)),
                }
            }

            let number = self.store.next_ticket_number()?;
            let now = self.clock.now();
            let priority = request.priority.unwrap_or_default();
            let duration = self.machine.policy().duration_for(priority, request.category);

            let mut ticket = Ticket {
                id: format_ticket_id(number),
                title,
                description: request.description.trim().to_string(),
                category: request.category,
                sub_category: request
                    .sub_category
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                priority,
                severity: Default::default(),
                status: TicketStatus::Created,
                created_by: actor.user_id.clone(),
                customer_id: customer_id.clone(),
                assignees: Vec::new(),
                created_at: now,
                updated_at: now,
                sla: SlaClock::start(now, duration),
                resolved_at: None,
                feedback: None,
                attachments: Vec::new(),
                field_dispatch: false,
                log_sequence: 0,
                last_activity_at: now,
            };

            let mut log = ActivityRecorder::new();
            let description = if customer_id == actor.user_id {
                format!("Ticket created by {}", actor)
            } else {
                format!("Ticket created by {} on behalf of {}", actor, customer_id)
            };
            log.record(&mut ticket, actor, ActivityType::Creation, description, false, now);
            for name in request.attachments.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
                push_attachment(&mut ticket, &mut log, actor, name, now);
            }

            let record = idempotency.map(|(key, fingerprint)| IdempotencyRecord {
                key,
                fingerprint,
                ticket_id: ticket.id.clone(),
                created_at: now,
            });
            let ticket = self.commit(ticket, log, record)?;
            drop(replay_guard);

            info!(
                ticket_id = %ticket.id,
                priority = %ticket.priority,
                category = %ticket.category,
                deadline = %ticket.sla.deadline,
                "Ticket created"
            );
            Ok(ticket)
        })
        .await
    }

    fn customer_for(&self, request: &NewTicket, actor: &Actor) -> TicketResult<String> {
        match actor.role {
            Role::Customer => match request.customer_id.as_deref() {
                None => Ok(actor.user_id.clone()),
                Some(id) if id == actor.user_id => Ok(actor.user_id.clone()),
                Some(_) => Err(TicketError::forbidden(
                    actor.role,
                    "create tickets for other customers",
                )),
            },
            _ => {
                let id = request.customer_id.as_deref().ok_or_else(|| {
                    TicketError::invalid("customerId is required when an agent raises a ticket")
                })?;
                match self.store.get_user(id)? {
                    Some(user) if user.role == Role::Customer && user.active => Ok(user.id),
                    _ => Err(TicketError::NotFound {
                        kind: "Customer",
                        id: id.to_string(),
                    }),
                }
            }
        }
    }

    pub async fn get(&self, ticket_id: &str, actor: &Actor) -> TicketResult<Ticket> {
        traced("get", Some(ticket_id), actor, async {
            let ticket = self.load(ticket_id)?;
            self.authorize_view(&ticket, actor)?;
            Ok(ticket)
        })
        .await
    }

    /// Log entries in sequence order, filtered for the viewer, paged.
    pub async fn logs(
        &self,
        ticket_id: &str,
        actor: &Actor,
        page: PageRequest,
    ) -> TicketResult<Page<ActivityLogEntry>> {
        traced("logs", Some(ticket_id), actor, async {
            let ticket = self.load(ticket_id)?;
            self.authorize_view(&ticket, actor)?;
            let mut entries: Vec<ActivityLogEntry> = self
                .store
                .entries(ticket_id)?
                .into_iter()
                .filter(|e| self.authorizer.can_view_entry(actor.role, e))
                .collect();
            entries.sort_by_key(|e| e.sequence);
            Ok(Page::from_vec(entries, page))
        })
        .await
    }

    fn authorize_view(&self, ticket: &Ticket, actor: &Actor) -> TicketResult<()> {
        let is_own = RoleAuthorizer::is_own_ticket(actor, ticket);
        if !self.authorizer.can_view_ticket(actor.role, is_own) {
            return Err(TicketError::forbidden(actor.role, "view this ticket"));
        }
        Ok(())
    }

    /// Move a ticket to `to`, optionally attaching a note.
    ///
    /// Requesting the current status is a successful no-op.
    pub async fn transition(
        &self,
        ticket_id: &str,
        to: TicketStatus,
        note: Option<&str>,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("transition", Some(ticket_id), actor, async {
            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            let now = self.clock.now();
            let mut log = ActivityRecorder::new();

            // Team leads act only on tickets their team holds
            let _team_guard = if actor.role == Role::TeamLead && ticket.status != to {
                let guard = self.lock_team(&actor.user_id).await;
                self.require_team_ticket(actor, &ticket)?;
                Some(guard)
            } else {
                None
            };

            let outcome = self.machine.transition(&mut ticket, to, actor, now, &mut log)?;
            if outcome == TransitionOutcome::Unchanged {
                return Ok(ticket);
            }
            if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
                let internal =
                    self.config.activity.notes_internal && self.authorizer.can_write_internal(actor.role);
                log.record(&mut ticket, actor, ActivityType::Comment, note, internal, now);
            }

            let ticket = self.commit(ticket, log, None)?;
            info!(ticket_id, status = %ticket.status, actor = %actor, "Ticket status updated");
            Ok(ticket)
        })
        .await
    }

    pub async fn comment(
        &self,
        ticket_id: &str,
        text: &str,
        internal_only: bool,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("comment", Some(ticket_id), actor, async {
            let text = non_empty(text, "comment")?;
            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            let is_own = RoleAuthorizer::is_own_ticket(actor, &ticket);
            if !self.authorizer.can_comment(actor.role, is_own) {
                return Err(TicketError::forbidden(actor.role, "comment on this ticket"));
            }
            if internal_only && !self.authorizer.can_write_internal(actor.role) {
                return Err(TicketError::forbidden(actor.role, "write internal notes"));
            }

            let mut log = ActivityRecorder::new();
            log.record(
                &mut ticket,
                actor,
                ActivityType::Comment,
                text,
                internal_only,
                self.clock.now(),
            );
            self.commit(ticket, log, None)
        })
        .await
    }

    /// Record a reference to a file stored elsewhere.
    pub async fn add_attachment(
        &self,
        ticket_id: &str,
        name: &str,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("add_attachment", Some(ticket_id), actor, async {
            let name = non_empty(name, "attachment name")?;
            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            let is_own = RoleAuthorizer::is_own_ticket(actor, &ticket);
            if !self.authorizer.can_comment(actor.role, is_own) {
                return Err(TicketError::forbidden(actor.role, "add attachments to this ticket"));
            }

            let mut log = ActivityRecorder::new();
            push_attachment(&mut ticket, &mut log, actor, &name, self.clock.now());
            self.commit(ticket, log, None)
        })
        .await
    }

    /// Rate a fixed or resolved ticket; once per ticket, requester only.
    pub async fn feedback(
        &self,
        ticket_id: &str,
        rating: u8,
        comment: Option<&str>,
        actor: &Actor,
    ) -> TicketResult<Ticket> {
        traced("feedback", Some(ticket_id), actor, async {
            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            let is_own = RoleAuthorizer::is_own_ticket(actor, &ticket);
            if !self.authorizer.can_give_feedback(actor.role, is_own) {
                return Err(TicketError::forbidden(actor.role, "give feedback on this ticket"));
            }
            if !ticket.status.is_terminal() {
                return Err(TicketError::invalid(format!(
                    "feedback is only accepted on FIXED or RESOLVED tickets (status {})",
                    ticket.status
                )));
            }
            if ticket.feedback.is_some() {
                return Err(TicketError::invalid("feedback was already submitted"));
            }
            if !(1..=5).contains(&rating) {
                return Err(TicketError::invalid("rating must be between 1 and 5"));
            }

            let now = self.clock.now();
            let comment = comment.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);
            ticket.feedback = Some(Feedback {
                rating,
                comment,
                submitted_by: actor.user_id.clone(),
                submitted_at: now,
            });
            let mut log = ActivityRecorder::new();
            log.record(
                &mut ticket,
                actor,
                ActivityType::Feedback,
                format!("Rated {}/5 by {}", rating, actor),
                false,
                now,
            );
            self.commit(ticket, log, None)
        })
        .await
    }

    /// Reopen a fixed or resolved ticket with a reason.
    pub async fn reopen(&self, ticket_id: &str, reason: &str, actor: &Actor) -> TicketResult<Ticket> {
        traced("reopen", Some(ticket_id), actor, async {
            let reason = non_empty(reason, "reopen reason")?;
            let _guard = self.lock_ticket(ticket_id).await;
            let mut ticket = self.load(ticket_id)?;
            let now = self.clock.now();
            let mut log = ActivityRecorder::new();

            let outcome =
                self.machine
                    .transition(&mut ticket, TicketStatus::Reopened, actor, now, &mut log)?;
            if outcome == TransitionOutcome::Unchanged {
                return Ok(ticket);
            }
            log.record(
                &mut ticket,
                actor,
                ActivityType::Comment,
                format!("Reopen reason: {}", reason),
                false,
                now,
            );

            let ticket = self.commit(ticket, log, None)?;
            info!(ticket_id, deadline = %ticket.sla.deadline, "Ticket reopened");
            Ok(ticket)
        })
        .await
    }
}

fn push_attachment(
    ticket: &mut Ticket,
    log: &mut ActivityRecorder,
    actor: &Actor,
    name: &str,
    now: chrono::DateTime<chrono::Utc>,
) {
    ticket.attachments.push(AttachmentRef {
        name: name.to_string(),
        added_by: actor.user_id.clone(),
        added_at: now,
    });
    log.record(
        ticket,
        actor,
        ActivityType::AttachmentAdded,
        format!("Attachment '{}' added by {}", name, actor),
        false,
        now,
    );
}
