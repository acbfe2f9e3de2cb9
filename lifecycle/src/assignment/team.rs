//! Team membership changes made by team leads

use crate::authz::RoleAuthorizer;
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Team, User, UserId};
use crate::store::TicketStore;

/// Requested membership delta
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChanges {
    #[serde(default)]
    pub add: Vec<UserId>,
    #[serde(default)]
    pub remove: Vec<UserId>,
}

/// Compute the team after applying `changes`.
///
/// `current` is the lead's team as read under the team lock; when absent a
/// new team is created around the lead. Removals run before additions.
pub fn apply_member_changes(
    store: &dyn TicketStore,
    lead: &Actor,
    current: Option<Team>,
    changes: &MemberChanges,
) -> TicketResult<Team> {
    if !RoleAuthorizer.can_manage_team(lead.role) {
        return Err(TicketError::forbidden(lead.role, "manage team members"));
    }

    let mut team = match current {
        Some(team) => team,
        None => {
            let name = store
                .get_user(&lead.user_id)?
                .map(|u| format!("{}'s team", u.name))
                .unwrap_or_else(|| format!("{}'s team", lead.user_id));
            Team::new(lead.user_id.clone(), name)
        }
    };

    for id in &changes.remove {
        if *id == team.lead_id {
            return Err(TicketError::invalid("the team lead cannot be removed from the team"));
        }
        team.remove_member(id);
    }

    for id in &changes.add {
        let user = store
            .get_user(id)?
            .filter(|u| u.is_assignable())
            .ok_or_else(|| TicketError::UnknownEngineer {
                engineer_id: id.clone(),
            })?;
        if let Some(other) = store.team_of(&user.id)? {
            if other.lead_id != team.lead_id {
                return Err(TicketError::invalid(format!(
                    "{} already belongs to team '{}'",
                    user.id, other.name
                )));
            }
        }
        team.add_member(user.id);
    }

    Ok(team)
}

/// Active engineers that belong to no team
pub fn unassigned_engineers(store: &dyn TicketStore) -> TicketResult<Vec<User>> {
    let teams = store.list_teams()?;
    Ok(store
        .list_users()?
        .into_iter()
        .filter(|u| u.is_assignable())
        .filter(|u| !teams.iter().any(|t| t.is_member(&u.id)))
        .collect())
}
