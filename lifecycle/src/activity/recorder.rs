//! Staging buffer for the log entries of one operation
//!
//! The recorder assigns sequence numbers and monotonic timestamps and bumps
//! the ticket's bookkeeping fields, but writes nothing. Entries reach the
//! store only as part of the operation's single commit.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{ActivityLogEntry, ActivityType};
use crate::model::{Actor, Ticket};
use crate::state_machine::TransitionRecord;

#[derive(Debug, Default)]
pub struct ActivityRecorder {
    entries: Vec<ActivityLogEntry>,
}

impl ActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a plain entry
    pub fn record(
        &mut self,
        ticket: &mut Ticket,
        actor: &Actor,
        activity_type: ActivityType,
        description: impl Into<String>,
        internal_only: bool,
        now: DateTime<Utc>,
    ) -> ActivityLogEntry {
        self.stage(ticket, actor, activity_type, description.into(), internal_only, None, now)
    }

    /// Stage a status-change entry carrying its `{from, to}` pair
    pub fn record_transition(
        &mut self,
        ticket: &mut Ticket,
        actor: &Actor,
        activity_type: ActivityType,
        description: impl Into<String>,
        record: TransitionRecord,
        now: DateTime<Utc>,
    ) -> ActivityLogEntry {
        self.stage(
            ticket,
            actor,
            activity_type,
            description.into(),
            false,
            Some(record),
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn stage(
        &mut self,
        ticket: &mut Ticket,
        actor: &Actor,
        activity_type: ActivityType,
        description: String,
        internal_only: bool,
        transition: Option<TransitionRecord>,
        now: DateTime<Utc>,
    ) -> ActivityLogEntry {
        // Never go backwards, even if the wall clock does.
        let timestamp = now.max(ticket.last_activity_at);
        ticket.log_sequence += 1;
        ticket.last_activity_at = timestamp;
        ticket.updated_at = timestamp;

        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            ticket_id: ticket.id.clone(),
            sequence: ticket.log_sequence,
            actor: actor.clone(),
            activity_type,
            description,
            timestamp,
            internal_only,
            transition,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[ActivityLogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ActivityLogEntry> {
        self.entries
    }
}
