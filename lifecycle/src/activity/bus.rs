//! Notification bus
//!
//! Committed activity and sweep findings are broadcast to subscribers
//! (notification fan-out, dashboards). Publishing never fails an operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::types::ActivityLogEntry;
use crate::model::TicketId;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Events published after a successful commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketEvent {
    /// A committed activity log entry
    Activity { entry: ActivityLogEntry },
    /// The ticket entered the at-risk window
    SlaAtRisk {
        ticket_id: TicketId,
        remaining_secs: i64,
        detected_at: DateTime<Utc>,
    },
    /// The ticket's SLA deadline passed
    SlaBreached {
        ticket_id: TicketId,
        deadline: DateTime<Utc>,
        detected_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    pub fn ticket_id(&self) -> &str {
        match self {
            Self::Activity { entry } => &entry.ticket_id,
            Self::SlaAtRisk { ticket_id, .. } | Self::SlaBreached { ticket_id, .. } => ticket_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Activity { .. } => "activity",
            Self::SlaAtRisk { .. } => "sla_at_risk",
            Self::SlaBreached { .. } => "sla_breached",
        }
    }
}

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<TicketEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Broadcast to current subscribers; no subscribers is fine.
    pub fn publish(&self, event: TicketEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    pub fn publish_entries(&self, entries: &[ActivityLogEntry]) {
        for entry in entries {
            self.publish(TicketEvent::Activity {
                entry: entry.clone(),
            });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
