//! Role-Action Authorizer
//!
//! Pure, table-driven permission checks. Every service mutation consults
//! the authorizer before touching a ticket; a denial is always an error.

use crate::activity::ActivityLogEntry;
use crate::model::{Actor, Role, Ticket, TicketStatus};

/// Who a transition rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Any holder of the role.
    Any,
    /// Only when the ticket belongs to the actor (assignee or requester).
    Own,
}

/// One row of the transition permission table.
struct Rule {
    roles: &'static [Role],
    from: TicketStatus,
    to: TicketStatus,
    scope: Scope,
}

const TRIAGE: &[Role] = &[Role::TriageOfficer];
const ENGINEERS: &[Role] = &[Role::FieldEngineer, Role::NocEngineer, Role::L1Engineer];
const FIELD: &[Role] = &[Role::FieldEngineer];
const REQUESTERS: &[Role] = &[Role::Customer, Role::Agent];
const LEADS: &[Role] = &[Role::TeamLead];
const MANAGERS: &[Role] = &[Role::Manager];

const fn rule(roles: &'static [Role], from: TicketStatus, to: TicketStatus, scope: Scope) -> Rule {
    Rule {
        roles,
        from,
        to,
        scope,
    }
}

/// Transition permissions
///
/// ```text
/// TRIAGE_OFFICER   Created→NeedsTriaging|Assigned, NeedsTriaging→Assigned|AwaitingField,
///                  AwaitingField→Assigned, Reopened→NeedsTriaging|Assigned
/// engineers (own)  Assigned→InProgress|Fixed|AwaitingField, InProgress→Fixed|Resolved|AwaitingField,
///                  FieldVisitComplete→Fixed|Resolved
/// FIELD (own)      InProgress→FieldVisitComplete
/// TEAM_LEAD        Fixed→Resolved
/// requester (own)  Fixed→Resolved|Reopened, Resolved→Reopened
/// MANAGER          Fixed→Closed, Resolved→Closed
/// ```
const RULES: &[Rule] = {
    use Scope::*;
    use TicketStatus::*;
    &[
        rule(TRIAGE, Created, NeedsTriaging, Any),
        rule(TRIAGE, Created, Assigned, Any),
        rule(TRIAGE, NeedsTriaging, Assigned, Any),
        rule(TRIAGE, NeedsTriaging, AwaitingField, Any),
        rule(TRIAGE, AwaitingField, Assigned, Any),
        rule(TRIAGE, Reopened, NeedsTriaging, Any),
        rule(TRIAGE, Reopened, Assigned, Any),
        rule(ENGINEERS, Assigned, InProgress, Own),
        rule(ENGINEERS, Assigned, Fixed, Own),
        rule(ENGINEERS, Assigned, AwaitingField, Own),
        rule(ENGINEERS, InProgress, Fixed, Own),
        rule(ENGINEERS, InProgress, Resolved, Own),
        rule(ENGINEERS, InProgress, AwaitingField, Own),
        rule(FIELD, InProgress, FieldVisitComplete, Own),
        rule(ENGINEERS, FieldVisitComplete, Fixed, Own),
        rule(ENGINEERS, FieldVisitComplete, Resolved, Own),
        rule(LEADS, Fixed, Resolved, Any),
        rule(REQUESTERS, Fixed, Resolved, Own),
        rule(REQUESTERS, Fixed, Reopened, Own),
        rule(REQUESTERS, Resolved, Reopened, Own),
        rule(MANAGERS, Fixed, Closed, Any),
        rule(MANAGERS, Resolved, Closed, Any),
    ]
};

/// Stateless permission oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    /// Whether the ticket "belongs" to the actor for permission purposes:
    /// assigned engineers own it on the work side, the creator and the
    /// customer it was raised for own it on the requester side.
    pub fn is_own_ticket(actor: &Actor, ticket: &Ticket) -> bool {
        if actor.role.is_engineer() {
            ticket.is_assignee(&actor.user_id)
        } else if actor.role.is_requester() {
            ticket.is_requester(&actor.user_id)
        } else {
            false
        }
    }

    pub fn can_transition(
        &self,
        role: Role,
        from: TicketStatus,
        to: TicketStatus,
        is_own_ticket: bool,
    ) -> bool {
        RULES.iter().any(|r| {
            r.from == from
                && r.to == to
                && r.roles.contains(&role)
                && (r.scope == Scope::Any || is_own_ticket)
        })
    }

    /// Triage officers and team leads may set assignees.
    pub fn can_assign(&self, role: Role) -> bool {
        matches!(role, Role::TriageOfficer | Role::TeamLead)
    }

    /// Triage decisions and suggestions belong to triage officers.
    pub fn can_triage(&self, role: Role) -> bool {
        role == Role::TriageOfficer
    }

    /// Customers raise tickets for themselves, agents on behalf of customers.
    pub fn can_create(&self, role: Role) -> bool {
        role.is_requester()
    }

    /// Priority/severity changes after triage.
    pub fn can_retriage(&self, role: Role) -> bool {
        matches!(role, Role::TriageOfficer | Role::TeamLead)
    }

    pub fn can_view_ticket(&self, role: Role, is_own_ticket: bool) -> bool {
        role != Role::Customer || is_own_ticket
    }

    /// Only the requester side rates a finished ticket.
    pub fn can_give_feedback(&self, role: Role, is_own_ticket: bool) -> bool {
        role.is_requester() && is_own_ticket
    }

    /// Comments come from anyone involved; customers only on their own tickets.
    pub fn can_comment(&self, role: Role, is_own_ticket: bool) -> bool {
        match role {
            Role::Customer | Role::Agent => is_own_ticket,
            r if r.is_engineer() => is_own_ticket,
            Role::TriageOfficer | Role::TeamLead | Role::Manager => true,
            _ => false,
        }
    }

    /// Internal entries may only be written by staff.
    pub fn can_write_internal(&self, role: Role) -> bool {
        !role.is_requester()
    }

    pub fn can_manage_team(&self, role: Role) -> bool {
        role == Role::TeamLead
    }

    /// Directory administration: listing staff and changing their roles.
    pub fn can_manage_users(&self, role: Role) -> bool {
        matches!(role, Role::NocAdmin | Role::Manager)
    }

    /// Roles an administrator may hand out. Customers come from sign-up;
    /// executive and admin accounts are provisioned in configuration.
    pub fn is_assignable_role(&self, role: Role) -> bool {
        !matches!(role, Role::Customer | Role::Cxo | Role::NocAdmin)
    }

    /// Organisation-wide ticket listing.
    pub fn can_view_all(&self, role: Role) -> bool {
        matches!(role, Role::Manager | Role::Cxo | Role::NocAdmin)
    }

    /// Internal-only entries are hidden from customers.
    pub fn can_view_entry(&self, role: Role, entry: &ActivityLogEntry) -> bool {
        !(entry.internal_only && role == Role::Customer)
    }
}
