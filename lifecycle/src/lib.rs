//! Ticket Lifecycle & SLA Engine
//!
//! This library provides the backend engine of a network-support ticketing
//! product:
//! - A table-driven ticket state machine with role-based authorization
//! - Per-ticket SLA clocks with pause/resume, at-risk and breach detection
//! - Engineer assignment, triage suggestions and team management
//! - An append-only activity log with a notification bus
//! - A ticket service that serializes work per ticket and commits atomically
//!
//! # Operation Pipeline
//!
//! ```text
//! Actor ──► TicketService ──► lock ticket ──► RoleAuthorizer
//!                                  │
//!                                  ▼
//!                     StateMachine / SlaClock / AssignmentResolver
//!                                  │
//!                                  ▼
//!                  ActivityRecorder ──► TicketStore::commit ──► EventBus
//! ```
//!
//! # Background Work
//!
//! The [`sla::Sweeper`] scans open tickets on an interval and flags at-risk
//! and breached SLAs exactly once per clock run.

#![allow(clippy::uninlined_format_args)]

pub mod activity;
pub mod assignment;
pub mod authz;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod locks;
pub mod model;
pub mod otel;
pub mod service;
pub mod sla;
pub mod state_machine;
pub mod store;

// Re-export key types
pub use activity::{ActivityLogEntry, ActivityType, EventBus, Page, PageRequest, TicketEvent};
pub use assignment::{
    MemberChanges, RuleBasedProvider, Suggestion, SuggestionProvider, SuggestionRequest,
};
pub use authz::RoleAuthorizer;
pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorCode, TicketError, TicketResult};
pub use model::{
    Actor, Category, Priority, Role, Severity, Team, Ticket, TicketId, TicketStatus, User, UserId,
};
pub use service::{
    AcceptSuggestion, NewTicket, SharedTicketService, TicketFilter, TicketService, TriageRequest,
};
pub use sla::{
    Clock, ManualClock, SlaClock, SlaPolicy, SweepMetricsSnapshot, Sweeper, SystemClock,
    MAX_SLA_HOURS,
};
pub use state_machine::{StateMachine, TransitionOutcome};
pub use store::{MemoryStore, SharedStore, StoreError, TicketStore};
