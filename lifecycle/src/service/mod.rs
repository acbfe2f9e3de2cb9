//! Ticket Service
//!
//! Composes the state machine, SLA clock, authorizer, assignment resolver and
//! activity recorder into the operations clients call. Every mutation runs
//! the same pipeline:
//!
//! ```text
//! lock ticket → load → authorize → validate → mutate → stage log entries
//!             → single atomic commit → publish → return snapshot
//! ```
//!
//! Nothing is written before the commit, so a failed or dropped operation
//! leaves no trace. Operations on different tickets run in parallel; there is
//! no service-wide lock.

mod queries;
pub mod requests;
mod teams;
mod tickets;
mod triage;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn, Instrument};

use crate::activity::{ActivityRecorder, EventBus, SharedEventBus, TicketEvent};
use crate::assignment::{provider_from_config, AssignmentResolver, SharedSuggestionProvider};
use crate::authz::RoleAuthorizer;
use crate::config::EngineConfig;
use crate::error::{TicketError, TicketResult};
use crate::locks::{KeyGuard, KeyedLocks};
use crate::model::{Actor, Ticket};
use crate::otel;
use crate::sla::{Clock, SweepMetrics, Sweeper, SystemClock};
use crate::state_machine::StateMachine;
use crate::store::{Commit, IdempotencyRecord, SharedStore};

pub use requests::{AcceptSuggestion, NewTicket, TicketFilter, TriageRequest, MAX_TITLE_LEN};

/// Shared reference to TicketService
pub type SharedTicketService = Arc<TicketService>;

pub struct TicketService {
    store: SharedStore,
    locks: Arc<KeyedLocks>,
    bus: SharedEventBus,
    clock: Arc<dyn Clock>,
    machine: StateMachine,
    authorizer: RoleAuthorizer,
    resolver: AssignmentResolver,
    suggestions: SharedSuggestionProvider,
    sweep_metrics: Arc<SweepMetrics>,
    config: EngineConfig,
}

impl TicketService {
    /// Build a service on `store` using the wall clock and the configured
    /// suggestion provider.
    pub fn new(config: EngineConfig, store: SharedStore) -> TicketResult<Self> {
        let suggestions = provider_from_config(&config.suggestion)?;
        Ok(Self {
            store,
            locks: Arc::new(KeyedLocks::new()),
            bus: EventBus::new().shared(),
            clock: Arc::new(SystemClock),
            machine: StateMachine::new(config.sla_policy()),
            authorizer: RoleAuthorizer,
            resolver: AssignmentResolver::new(),
            suggestions,
            sweep_metrics: Arc::new(SweepMetrics::default()),
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_suggestion_provider(mut self, provider: SharedSuggestionProvider) -> Self {
        self.suggestions = provider;
        self
    }

    pub fn shared(self) -> SharedTicketService {
        Arc::new(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TicketEvent> {
        self.bus.subscribe()
    }

    pub fn sweep_metrics(&self) -> Arc<SweepMetrics> {
        self.sweep_metrics.clone()
    }

    /// A sweeper sharing this service's store, locks, bus and clock.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.store.clone(),
            self.locks.clone(),
            self.bus.clone(),
            self.clock.clone(),
            self.config.sla.at_risk_threshold(),
            self.sweep_metrics.clone(),
        )
    }

    // =========================================================================
    // Pipeline helpers
    // =========================================================================

    async fn lock_ticket(&self, ticket_id: &str) -> KeyGuard {
        self.locks.lock(ticket_id).await
    }

    async fn lock_team(&self, lead_id: &str) -> KeyGuard {
        self.locks.lock(&format!("team:{}", lead_id)).await
    }

    fn load(&self, ticket_id: &str) -> TicketResult<Ticket> {
        self.store
            .get_ticket(ticket_id)?
            .ok_or_else(|| TicketError::ticket_not_found(ticket_id))
    }

    /// Write the snapshot and staged entries in one commit, then publish.
    fn commit(
        &self,
        ticket: Ticket,
        log: ActivityRecorder,
        idempotency: Option<IdempotencyRecord>,
    ) -> TicketResult<Ticket> {
        let entries = log.into_entries();
        let mut commit = Commit::new(ticket.clone(), entries.clone());
        commit.idempotency = idempotency;
        if let Err(e) = self.store.commit(commit) {
            warn!(ticket_id = %ticket.id, error = %e, "Commit failed, operation discarded");
            return Err(e.into());
        }
        self.bus.publish_entries(&entries);
        Ok(ticket)
    }
}

/// Run `fut` inside a `ticket.operation` span and record its outcome.
async fn traced<T, F>(
    operation: &'static str,
    ticket_id: Option<&str>,
    actor: &Actor,
    fut: F,
) -> TicketResult<T>
where
    F: Future<Output = TicketResult<T>>,
{
    let span = otel::operation_span(operation, ticket_id, actor);
    let result = fut.instrument(span.clone()).await;
    otel::record_outcome(&span, &result);
    if let Err(e) = &result {
        if e.is_retryable() {
            warn!(operation, actor = %actor, error = %e, "Operation failed");
        } else {
            debug!(operation, actor = %actor, error = %e, "Operation rejected");
        }
    }
    result
}

fn non_empty(value: &str, field: &str) -> TicketResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TicketError::invalid(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
