//! Engineer assignment validation
//!
//! The resolver only decides whether a requested engineer set is acceptable
//! and stages the `ASSIGNMENT` entry; loading, locking and committing are
//! the service's job. Team-lead requests must be resolved against a team
//! snapshot read while the caller holds that team's lock.

use chrono::{DateTime, Utc};

use crate::activity::{ActivityLogEntry, ActivityRecorder, ActivityType};
use crate::authz::RoleAuthorizer;
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Role, Team, Ticket, TicketStatus, User, UserId};
use crate::store::TicketStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentResolver {
    authorizer: RoleAuthorizer,
}

impl AssignmentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a requested engineer set and return it without duplicates.
    ///
    /// `team` is the acting team lead's team, if any; it is ignored for
    /// other roles.
    pub fn validate(
        &self,
        store: &dyn TicketStore,
        actor: &Actor,
        ticket: &Ticket,
        engineer_ids: &[UserId],
        team: Option<&Team>,
    ) -> TicketResult<Vec<UserId>> {
        if !self.authorizer.can_assign(actor.role) {
            return Err(TicketError::forbidden(actor.role, "assign engineers"));
        }

        let mut ids: Vec<UserId> = Vec::with_capacity(engineer_ids.len());
        for id in engineer_ids {
            let id = id.trim();
            if !id.is_empty() && !ids.iter().any(|i| i == id) {
                ids.push(id.to_string());
            }
        }
        if ids.is_empty() {
            return Err(TicketError::EmptyAssignment);
        }

        let lead_team = if actor.role == Role::TeamLead {
            Some(team.ok_or_else(|| TicketError::TeamNotConfigured {
                lead_id: actor.user_id.clone(),
            })?)
        } else {
            None
        };

        let field_only = ticket.status == TicketStatus::AwaitingField;
        for id in &ids {
            let unknown = || TicketError::UnknownEngineer {
                engineer_id: id.clone(),
            };
            let user = store.get_user(id)?.ok_or_else(unknown)?;
            if !user.is_assignable() {
                return Err(unknown());
            }
            if field_only && user.role != Role::FieldEngineer {
                return Err(unknown());
            }
            if let Some(team) = lead_team {
                if !team.is_member(id) || *id == team.lead_id {
                    return Err(unknown());
                }
            }
        }

        Ok(ids)
    }

    /// Replace the ticket's assignees and stage the `ASSIGNMENT` entry.
    pub fn apply(
        &self,
        ticket: &mut Ticket,
        engineer_ids: Vec<UserId>,
        actor: &Actor,
        now: DateTime<Utc>,
        log: &mut ActivityRecorder,
    ) -> ActivityLogEntry {
        let previous = ticket.assignees.clone();
        ticket.set_assignees(engineer_ids);
        let description = if previous.is_empty() {
            format!("Assigned to {} by {}", ticket.assignees.join(", "), actor)
        } else {
            format!(
                "Reassigned from {} to {} by {}",
                previous.join(", "),
                ticket.assignees.join(", "),
                actor
            )
        };
        log.record(ticket, actor, ActivityType::Assignment, description, false, now)
    }

    /// Engineers this actor may pick for this ticket.
    pub fn assignable_engineers(
        &self,
        store: &dyn TicketStore,
        actor: &Actor,
        ticket: &Ticket,
        team: Option<&Team>,
    ) -> TicketResult<Vec<User>> {
        if !self.authorizer.can_assign(actor.role) {
            return Err(TicketError::forbidden(actor.role, "assign engineers"));
        }
        let field_only = ticket.status == TicketStatus::AwaitingField;
        let lead_team = if actor.role == Role::TeamLead {
            Some(team.ok_or_else(|| TicketError::TeamNotConfigured {
                lead_id: actor.user_id.clone(),
            })?)
        } else {
            None
        };

        Ok(store
            .list_users()?
            .into_iter()
            .filter(|u| u.is_assignable())
            .filter(|u| !field_only || u.role == Role::FieldEngineer)
            .filter(|u| lead_team.map_or(true, |t| t.is_member(&u.id)))
            .collect())
    }
}
