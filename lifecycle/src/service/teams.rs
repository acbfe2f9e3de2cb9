//! Team management and the user directory

use tracing::info;

use super::{traced, TicketService};
use crate::assignment::{self, MemberChanges};
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Role, Team, User};

/// Serializes roster changes across teams so an engineer cannot be added to
/// two teams at once.
const ROSTER_LOCK: &str = "team-roster";

impl TicketService {
    /// The calling lead's team
    pub async fn team(&self, actor: &Actor) -> TicketResult<Team> {
        traced("team", None, actor, async { self.lead_team(actor) }).await
    }

    /// Directory entries for every member of the calling lead's team, lead first
    pub async fn team_members(&self, actor: &Actor) -> TicketResult<Vec<User>> {
        traced("team_members", None, actor, async {
            let team = self.lead_team(actor)?;
            let mut members = Vec::with_capacity(team.members.len());
            for id in &team.members {
                if let Some(user) = self.store.get_user(id)? {
                    members.push(user);
                }
            }
            Ok(members)
        })
        .await
    }

    /// Add and remove engineers; creates the team on first use.
    pub async fn update_team_members(
        &self,
        actor: &Actor,
        changes: MemberChanges,
    ) -> TicketResult<Team> {
        traced("update_team_members", None, actor, async {
            if !self.authorizer.can_manage_team(actor.role) {
                return Err(TicketError::forbidden(actor.role, "manage team members"));
            }
            let _team_guard = self.lock_team(&actor.user_id).await;
            let _roster_guard = self.locks.lock(ROSTER_LOCK).await;

            let current = self.store.get_team(&actor.user_id)?;
            let team =
                assignment::apply_member_changes(self.store.as_ref(), actor, current, &changes)?;
            self.store.put_team(&team)?;
            info!(
                lead_id = %team.lead_id,
                added = changes.add.len(),
                removed = changes.remove.len(),
                members = team.members.len(),
                "Team updated"
            );
            Ok(team)
        })
        .await
    }

    /// Active engineers not on any team
    pub async fn unassigned_engineers(&self, actor: &Actor) -> TicketResult<Vec<User>> {
        traced("unassigned_engineers", None, actor, async {
            if !self.authorizer.can_manage_team(actor.role) && !self.authorizer.can_view_all(actor.role) {
                return Err(TicketError::forbidden(actor.role, "list unassigned engineers"));
            }
            assignment::unassigned_engineers(self.store.as_ref())
        })
        .await
    }

    /// Every team in the organisation, by name
    pub async fn list_teams(&self, actor: &Actor) -> TicketResult<Vec<Team>> {
        traced("list_teams", None, actor, async {
            if !self.authorizer.can_view_all(actor.role) && !self.authorizer.can_manage_team(actor.role) {
                return Err(TicketError::forbidden(actor.role, "list teams"));
            }
            let mut teams = self.store.list_teams()?;
            teams.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.lead_id.cmp(&b.lead_id)));
            Ok(teams)
        })
        .await
    }

    /// Internal staff, by id. Customers are not administered here.
    pub async fn list_users(&self, actor: &Actor) -> TicketResult<Vec<User>> {
        traced("list_users", None, actor, async {
            if !self.authorizer.can_manage_users(actor.role) {
                return Err(TicketError::forbidden(actor.role, "list users"));
            }
            let mut users: Vec<User> = self
                .store
                .list_users()?
                .into_iter()
                .filter(|u| u.role != Role::Customer)
                .collect();
            users.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(users)
        })
        .await
    }

    /// Move a staff member to another role.
    ///
    /// Refused when the change would strand team or ticket state: a lead
    /// with a team stays a lead, and an engineer who sits on a team or holds
    /// open tickets stays an engineer until those are handed over.
    pub async fn change_role(&self, actor: &Actor, user_id: &str, role: Role) -> TicketResult<User> {
        traced("change_role", None, actor, async {
            if !self.authorizer.can_manage_users(actor.role) {
                return Err(TicketError::forbidden(actor.role, "change user roles"));
            }
            if !self.authorizer.is_assignable_role(role) {
                return Err(TicketError::invalid(format!("role {} cannot be assigned", role)));
            }
            if actor.user_id == user_id {
                return Err(TicketError::invalid("users cannot change their own role"));
            }

            let _roster_guard = self.locks.lock(ROSTER_LOCK).await;
            let mut user = self
                .store
                .get_user(user_id)?
                .ok_or_else(|| TicketError::NotFound {
                    kind: "User",
                    id: user_id.to_string(),
                })?;
            if user.role == Role::Customer {
                return Err(TicketError::invalid(format!("{} is a customer account", user.id)));
            }
            if user.role == role {
                return Ok(user);
            }

            if user.role == Role::TeamLead && self.store.get_team(&user.id)?.is_some() {
                return Err(TicketError::invalid(format!(
                    "{} still leads a team",
                    user.id
                )));
            }
            if user.role.is_engineer() && !role.is_engineer() {
                if let Some(team) = self.store.team_of(&user.id)? {
                    return Err(TicketError::invalid(format!(
                        "{} is still on team '{}'",
                        user.id, team.name
                    )));
                }
                let holds_open = self
                    .store
                    .list_tickets()?
                    .iter()
                    .any(|t| t.status.is_open() && t.is_assignee(&user.id));
                if holds_open {
                    return Err(TicketError::invalid(format!(
                        "{} still holds open tickets",
                        user.id
                    )));
                }
            }

            let previous = user.role;
            user.role = role;
            self.store.put_user(&user)?;
            info!(user_id = %user.id, from = %previous, to = %role, by = %actor, "Role changed");
            Ok(user)
        })
        .await
    }

    /// Insert or replace a directory entry
    pub fn upsert_user(&self, user: &User) -> TicketResult<()> {
        if user.id.trim().is_empty() {
            return Err(TicketError::invalid("user id must not be empty"));
        }
        self.store.put_user(user)?;
        Ok(())
    }

    /// Look up the caller's role in the directory.
    pub fn resolve_actor(&self, user_id: &str) -> TicketResult<Actor> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| TicketError::NotFound {
                kind: "User",
                id: user_id.to_string(),
            })?;
        if !user.active {
            return Err(TicketError::Forbidden {
                role: user.role,
                action: "act while deactivated".into(),
            });
        }
        Ok(user.actor())
    }

    /// Load the users and teams listed in the engine configuration.
    pub fn seed_directory(&self) -> TicketResult<()> {
        for user in &self.config.users {
            self.upsert_user(user)?;
        }
        for team in &self.config.teams {
            self.store.put_team(team)?;
        }
        info!(
            users = self.config.users.len(),
            teams = self.config.teams.len(),
            "Directory seeded"
        );
        Ok(())
    }
}
