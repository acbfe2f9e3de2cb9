//! Ticket State Machine: explicit statuses and legal transition guards.
//!
//! Provides a typed status model for the ticket lifecycle so that:
//! 1. Every status change is checked against one adjacency table.
//! 2. Every applied transition is recorded in the activity log with its
//!    `{from, to}` pair, so status history can be replayed from the log.
//! 3. SLA side effects (pause on terminal entry, resume on reopen) happen in
//!    the same step as the status change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityLogEntry, ActivityRecorder, ActivityType};
use crate::authz::RoleAuthorizer;
use crate::error::{TicketError, TicketResult};
use crate::model::{Actor, Ticket};
use crate::sla::SlaPolicy;

/// The set of ticket statuses.
///
/// Every ticket starts at `Created`. `Fixed` and `Resolved` are terminal
/// (SLA paused) but re-enterable through `Reopened`; `Closed` is archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Raised by a customer or agent, nobody has looked at it yet.
    Created,
    /// Flagged for manual triage.
    NeedsTriaging,
    /// Engineers assigned, work not started.
    Assigned,
    /// An assignee is working on it.
    InProgress,
    /// Needs on-site work; waiting for a field engineer assignment.
    AwaitingField,
    /// Field engineer finished the on-site visit.
    FieldVisitComplete,
    /// Engineer reports the issue fixed; terminal.
    Fixed,
    /// Resolution confirmed; terminal.
    Resolved,
    /// Requester reopened a fixed/resolved ticket.
    Reopened,
    /// Archived; no further transitions.
    Closed,
}

impl TicketStatus {
    /// Every status, in lifecycle order
    pub fn all() -> &'static [TicketStatus] {
        use TicketStatus::*;
        &[
            Created,
            NeedsTriaging,
            Assigned,
            InProgress,
            AwaitingField,
            FieldVisitComplete,
            Fixed,
            Resolved,
            Reopened,
            Closed,
        ]
    }

    /// Whether this is a terminal status (work finished, reopen possible).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Fixed | Self::Resolved)
    }

    /// Whether the ticket still has a running SLA obligation.
    pub fn is_open(self) -> bool {
        !self.is_terminal() && self != Self::Closed
    }

    /// Entering this status freezes the SLA clock.
    pub fn pauses_sla(self) -> bool {
        matches!(self, Self::Fixed | Self::Resolved | Self::Closed)
    }

    /// Statuses that sit in the triage queue.
    pub fn awaits_triage(self) -> bool {
        matches!(self, Self::Created | Self::NeedsTriaging | Self::Reopened)
    }

    /// Statuses that can only be held with at least one assignee.
    pub fn requires_assignees(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::InProgress | Self::FieldVisitComplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::NeedsTriaging => "NEEDS_TRIAGING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::AwaitingField => "AWAITING_FIELD",
            Self::FieldVisitComplete => "FIELD_VISIT_COMPLETE",
            Self::Fixed => "FIXED",
            Self::Resolved => "RESOLVED",
            Self::Reopened => "REOPENED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal transitions between ticket statuses.
///
/// ```text
/// Created            → NeedsTriaging | Assigned
/// NeedsTriaging      → Assigned | AwaitingField
/// Assigned           → InProgress | Fixed | AwaitingField
/// InProgress         → Fixed | Resolved | AwaitingField | FieldVisitComplete
/// AwaitingField      → Assigned
/// FieldVisitComplete → Fixed | Resolved
/// Fixed              → Resolved | Reopened | Closed
/// Resolved           → Reopened | Closed
/// Reopened           → NeedsTriaging | Assigned
/// ```
pub const TRANSITIONS: &[(TicketStatus, TicketStatus)] = {
    use TicketStatus::*;
    &[
        (Created, NeedsTriaging),
        (Created, Assigned),
        (NeedsTriaging, Assigned),
        (NeedsTriaging, AwaitingField),
        (Assigned, InProgress),
        (Assigned, Fixed),
        (Assigned, AwaitingField),
        (InProgress, Fixed),
        (InProgress, Resolved),
        (InProgress, AwaitingField),
        (InProgress, FieldVisitComplete),
        (AwaitingField, Assigned),
        (FieldVisitComplete, Fixed),
        (FieldVisitComplete, Resolved),
        (Fixed, Resolved),
        (Fixed, Reopened),
        (Fixed, Closed),
        (Resolved, Reopened),
        (Resolved, Closed),
        (Reopened, NeedsTriaging),
        (Reopened, Assigned),
    ]
};

/// Whether `from → to` is an edge of the adjacency table.
pub fn is_legal_transition(from: TicketStatus, to: TicketStatus) -> bool {
    TRANSITIONS.iter().any(|&(f, t)| f == from && t == to)
}

/// Statuses reachable from `from` in one step.
pub fn successors(from: TicketStatus) -> impl Iterator<Item = TicketStatus> {
    TRANSITIONS
        .iter()
        .filter(move |(f, _)| *f == from)
        .map(|(_, t)| *t)
}

/// A single applied status change, stored on its activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TicketStatus,
    pub to: TicketStatus,
}

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Requested status equals the current one; nothing recorded.
    Unchanged,
    /// Status changed; the staged log entry is attached.
    Applied(ActivityLogEntry),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// The ticket state machine.
///
/// Holds the SLA policy (for fresh durations on reopen) and the authorizer.
/// All checks run before the ticket is touched, so a rejected transition
/// leaves status, assignees, SLA clock and log sequence unchanged.
#[derive(Debug, Clone)]
pub struct StateMachine {
    policy: SlaPolicy,
    authorizer: RoleAuthorizer,
}

impl StateMachine {
    pub fn new(policy: SlaPolicy) -> Self {
        Self {
            policy,
            authorizer: RoleAuthorizer,
        }
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    /// Attempt to move `ticket` to `to` on behalf of `actor`.
    pub fn transition(
        &self,
        ticket: &mut Ticket,
        to: TicketStatus,
        actor: &Actor,
        now: DateTime<Utc>,
        log: &mut ActivityRecorder,
    ) -> TicketResult<TransitionOutcome> {
        let from = ticket.status;
        if from == to {
            return Ok(TransitionOutcome::Unchanged);
        }

        if !is_legal_transition(from, to) {
            return Err(TicketError::InvalidTransition { from, to });
        }

        let is_own = RoleAuthorizer::is_own_ticket(actor, ticket);
        if !self.authorizer.can_transition(actor.role, from, to, is_own) {
            return Err(TicketError::UnauthorizedTransition {
                role: actor.role,
                from,
                to,
            });
        }

        self.check_guards(ticket, to)?;

        // All checks passed; mutate.
        ticket.status = to;
        match to {
            TicketStatus::AwaitingField => {
                ticket.assignees.clear();
                ticket.field_dispatch = true;
            }
            TicketStatus::Reopened => {
                // Back in the triage queue; the next triage picks engineers.
                ticket.assignees.clear();
                let duration = self.policy.duration_for(ticket.priority, ticket.category);
                ticket.sla.resume(now, duration);
                ticket.resolved_at = None;
            }
            _ => {}
        }
        if to.pauses_sla() {
            ticket.sla.pause(now);
        }
        if to.is_terminal() && ticket.resolved_at.is_none() {
            ticket.resolved_at = Some(now);
        }

        let activity_type = match to {
            TicketStatus::Fixed | TicketStatus::Resolved => ActivityType::Resolution,
            TicketStatus::Reopened => ActivityType::Reopened,
            _ => ActivityType::StatusChange,
        };
        let record = TransitionRecord { from, to };
        let entry = log.record_transition(
            ticket,
            actor,
            activity_type,
            format!("Status changed from {} to {} by {}", from, to, actor),
            record,
            now,
        );

        tracing::debug!(
            ticket_id = %ticket.id,
            from = %from,
            to = %to,
            actor = %actor.user_id,
            "Ticket transition"
        );

        Ok(TransitionOutcome::Applied(entry))
    }

    fn check_guards(&self, ticket: &Ticket, to: TicketStatus) -> TicketResult<()> {
        if to.requires_assignees() && ticket.assignees.is_empty() {
            return Err(TicketError::EmptyAssignment);
        }
        if to == TicketStatus::FieldVisitComplete && !ticket.field_dispatch {
            return Err(TicketError::InvalidTransition {
                from: ticket.status,
                to,
            });
        }
        Ok(())
    }
}

/// Rebuild the status history of a ticket from its activity log.
///
/// Entries are ordered by sequence number before replay.
pub fn replay(entries: &[ActivityLogEntry]) -> Vec<TransitionRecord> {
    let mut ordered: Vec<&ActivityLogEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);
    ordered.into_iter().filter_map(|e| e.transition).collect()
}

/// Status at the end of a replayed history (starting from `Created`).
pub fn replayed_status(entries: &[ActivityLogEntry]) -> TicketStatus {
    replay(entries)
        .last()
        .map(|r| r.to)
        .unwrap_or(TicketStatus::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Priority, Role, Severity};
    use crate::sla::SlaClock;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 10, 0, 0).unwrap()
    }

    fn ticket(status: TicketStatus) -> Ticket {
        Ticket {
            id: "TKT00001".into(),
            title: "Wi-Fi drops in conference room".into(),
            description: "Signal keeps dropping".into(),
            category: Category::NetworkConnectivity,
            sub_category: None,
            priority: Priority::Critical,
            severity: Severity::Major,
            status,
            created_by: "CUST001".into(),
            customer_id: "CUST001".into(),
            assignees: Vec::new(),
            created_at: t0(),
            updated_at: t0(),
            sla: SlaClock::start(t0(), Duration::hours(4)),
            resolved_at: None,
            feedback: None,
            attachments: Vec::new(),
            field_dispatch: false,
            log_sequence: 1,
            last_activity_at: t0(),
        }
    }

    fn machine() -> StateMachine {
        StateMachine::new(SlaPolicy::default())
    }

    #[test]
    fn test_table_has_no_self_loops_or_closed_exits() {
        for (from, to) in TRANSITIONS {
            assert_ne!(from, to);
            assert_ne!(*from, TicketStatus::Closed);
        }
    }

    #[test]
    fn test_every_status_reachable_from_created() {
        let mut seen = vec![TicketStatus::Created];
        let mut frontier = vec![TicketStatus::Created];
        while let Some(s) = frontier.pop() {
            for next in successors(s) {
                if !seen.contains(&next) {
                    seen.push(next);
                    frontier.push(next);
                }
            }
        }
        for status in TicketStatus::all() {
            assert!(seen.contains(status), "{} unreachable", status);
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut t = ticket(TicketStatus::Created);
        let mut log = ActivityRecorder::new();
        let out = machine()
            .transition(
                &mut t,
                TicketStatus::Created,
                &Actor::new("NOBODY", Role::Cxo),
                t0(),
                &mut log,
            )
            .unwrap();
        assert_eq!(out, TransitionOutcome::Unchanged);
        assert!(log.is_empty());
    }

    #[test]
    fn test_illegal_skip_transition() {
        let mut t = ticket(TicketStatus::Created);
        let mut log = ActivityRecorder::new();
        let err = machine()
            .transition(
                &mut t,
                TicketStatus::Fixed,
                &Actor::new("TRI1", Role::TriageOfficer),
                t0(),
                &mut log,
            )
            .unwrap_err();
        assert_eq!(
            err,
            TicketError::InvalidTransition {
                from: TicketStatus::Created,
                to: TicketStatus::Fixed
            }
        );
        assert_eq!(t.status, TicketStatus::Created);
    }

    #[test]
    fn test_unassigned_engineer_cannot_start_work() {
        let mut t = ticket(TicketStatus::Assigned);
        t.set_assignees(["ENG001"]);
        let before = t.clone();
        let mut log = ActivityRecorder::new();
        let err = machine()
            .transition(
                &mut t,
                TicketStatus::InProgress,
                &Actor::new("ENG002", Role::L1Engineer),
                t0(),
                &mut log,
            )
            .unwrap_err();
        assert!(matches!(err, TicketError::UnauthorizedTransition { .. }));
        assert_eq!(t, before);
        assert!(log.is_empty());
    }

    #[test]
    fn test_assignee_starts_and_fixes() {
        let mut t = ticket(TicketStatus::Assigned);
        t.set_assignees(["ENG001"]);
        let eng = Actor::new("ENG001", Role::L1Engineer);
        let mut log = ActivityRecorder::new();
        let sm = machine();

        sm.transition(&mut t, TicketStatus::InProgress, &eng, t0(), &mut log)
            .unwrap();
        let fixed_at = t0() + Duration::hours(1);
        let out = sm
            .transition(&mut t, TicketStatus::Fixed, &eng, fixed_at, &mut log)
            .unwrap();

        assert!(out.is_applied());
        assert_eq!(t.status, TicketStatus::Fixed);
        assert_eq!(t.resolved_at, Some(fixed_at));
        assert!(!t.sla.is_running());
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[1].activity_type, ActivityType::Resolution);
    }

    #[test]
    fn test_awaiting_field_clears_assignees() {
        let mut t = ticket(TicketStatus::InProgress);
        t.set_assignees(["ENG001"]);
        let mut log = ActivityRecorder::new();
        machine()
            .transition(
                &mut t,
                TicketStatus::AwaitingField,
                &Actor::new("ENG001", Role::NocEngineer),
                t0(),
                &mut log,
            )
            .unwrap();
        assert!(t.assignees.is_empty());
        assert!(t.field_dispatch);
    }

    #[test]
    fn test_field_visit_requires_dispatch() {
        let mut t = ticket(TicketStatus::InProgress);
        t.set_assignees(["ENG004"]);
        let field = Actor::new("ENG004", Role::FieldEngineer);
        let mut log = ActivityRecorder::new();
        let err = machine()
            .transition(&mut t, TicketStatus::FieldVisitComplete, &field, t0(), &mut log)
            .unwrap_err();
        assert!(matches!(err, TicketError::InvalidTransition { .. }));

        t.field_dispatch = true;
        machine()
            .transition(&mut t, TicketStatus::FieldVisitComplete, &field, t0(), &mut log)
            .unwrap();
        assert_eq!(t.status, TicketStatus::FieldVisitComplete);
    }

    #[test]
    fn test_entering_assigned_requires_assignees() {
        let mut t = ticket(TicketStatus::NeedsTriaging);
        let mut log = ActivityRecorder::new();
        let err = machine()
            .transition(
                &mut t,
                TicketStatus::Assigned,
                &Actor::new("TRI1", Role::TriageOfficer),
                t0(),
                &mut log,
            )
            .unwrap_err();
        assert_eq!(err, TicketError::EmptyAssignment);
    }

    #[test]
    fn test_reopen_resumes_sla_with_fresh_duration() {
        let mut t = ticket(TicketStatus::Resolved);
        t.sla.pause(t0() + Duration::hours(2));
        t.resolved_at = Some(t0() + Duration::hours(2));
        let reopen_at = t0() + Duration::hours(30);
        let mut log = ActivityRecorder::new();
        machine()
            .transition(
                &mut t,
                TicketStatus::Reopened,
                &Actor::new("CUST001", Role::Customer),
                reopen_at,
                &mut log,
            )
            .unwrap();

        assert!(t.sla.is_running());
        assert_eq!(t.sla.started_at, reopen_at);
        assert_eq!(t.sla.remaining(reopen_at), Duration::hours(4));
        assert_eq!(t.resolved_at, None);
        assert!(t.is_untriaged());
        assert_eq!(log.entries()[0].activity_type, ActivityType::Reopened);
    }

    #[test]
    fn test_replay_follows_table() {
        let mut t = ticket(TicketStatus::Created);
        let mut log = ActivityRecorder::new();
        let sm = machine();
        let triage = Actor::new("TRI1", Role::TriageOfficer);
        let eng = Actor::new("ENG001", Role::L1Engineer);

        sm.transition(&mut t, TicketStatus::NeedsTriaging, &triage, t0(), &mut log)
            .unwrap();
        t.set_assignees(["ENG001"]);
        sm.transition(&mut t, TicketStatus::Assigned, &triage, t0(), &mut log)
            .unwrap();
        sm.transition(&mut t, TicketStatus::InProgress, &eng, t0(), &mut log)
            .unwrap();
        sm.transition(&mut t, TicketStatus::Resolved, &eng, t0(), &mut log)
            .unwrap();

        let history = replay(log.entries());
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|r| is_legal_transition(r.from, r.to)));
        assert_eq!(replayed_status(log.entries()), TicketStatus::Resolved);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TicketStatus::NeedsTriaging.to_string(), "NEEDS_TRIAGING");
        assert_eq!(
            serde_json::to_string(&TicketStatus::FieldVisitComplete).unwrap(),
            "\"FIELD_VISIT_COMPLETE\""
        );
    }
}
