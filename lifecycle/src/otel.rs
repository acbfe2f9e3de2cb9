//! OpenTelemetry-Compatible Span Helpers
//!
//! Structured `tracing` spans for the ticket engine. Field names use dot
//! notation so they map onto OpenTelemetry attributes when exported.
//!
//! # Span Hierarchy
//!
//! ```text
//! ticket.operation        (one per service call)
//!   └─ ticket.suggestion  (AI/rule suggestion fetch)
//! ticket.sweep            (one per background SLA sweep)
//! ```

use tracing::Span;

use crate::model::Actor;
use crate::sla::SweepReport;

// ── Span Name Constants ──────────────────────────────────────────────

pub const SPAN_OPERATION: &str = "ticket.operation";
pub const SPAN_SUGGESTION: &str = "ticket.suggestion";
pub const SPAN_SWEEP: &str = "ticket.sweep";

// ── Field Name Constants ─────────────────────────────────────────────

pub const FIELD_TICKET_ID: &str = "ticket.id";
pub const FIELD_OPERATION: &str = "ticket.op";
pub const FIELD_ACTOR: &str = "ticket.actor";
pub const FIELD_ROLE: &str = "ticket.actor.role";
pub const FIELD_OUTCOME: &str = "ticket.outcome";
pub const FIELD_ERROR_CODE: &str = "ticket.error_code";

// ── Span Builders ────────────────────────────────────────────────────

/// Span for one service operation.
///
/// `ticket.outcome` and `ticket.error_code` are filled by [`record_outcome`].
pub fn operation_span(operation: &str, ticket_id: Option<&str>, actor: &Actor) -> Span {
    tracing::info_span!(
        "ticket.operation",
        "ticket.op" = %operation,
        "ticket.id" = ticket_id.unwrap_or("-"),
        "ticket.actor" = %actor.user_id,
        "ticket.actor.role" = %actor.role,
        "ticket.outcome" = tracing::field::Empty,
        "ticket.error_code" = tracing::field::Empty,
    )
}

/// Record how an operation ended.
pub fn record_outcome<T>(span: &Span, result: &crate::error::TicketResult<T>) {
    match result {
        Ok(_) => {
            span.record("ticket.outcome", "ok");
        }
        Err(e) => {
            span.record("ticket.outcome", "error");
            span.record("ticket.error_code", e.code().as_str());
        }
    }
}

pub fn suggestion_span(ticket_id: &str, provider: &str) -> Span {
    tracing::info_span!(
        "ticket.suggestion",
        "ticket.id" = %ticket_id,
        "ticket.suggestion.provider" = %provider,
    )
}

/// Span for one SLA sweep; counts filled by [`record_sweep`].
pub fn sweep_span() -> Span {
    tracing::info_span!(
        "ticket.sweep",
        "ticket.sweep.scanned" = tracing::field::Empty,
        "ticket.sweep.at_risk" = tracing::field::Empty,
        "ticket.sweep.breached" = tracing::field::Empty,
        "ticket.sweep.skipped" = tracing::field::Empty,
        "ticket.sweep.failures" = tracing::field::Empty,
    )
}

pub fn record_sweep(span: &Span, report: &SweepReport) {
    span.record("ticket.sweep.scanned", report.scanned as u64);
    span.record("ticket.sweep.at_risk", report.at_risk.len() as u64);
    span.record("ticket.sweep.breached", report.breached.len() as u64);
    span.record("ticket.sweep.skipped", report.skipped_busy as u64);
    span.record("ticket.sweep.failures", report.failures as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TicketError;
    use crate::model::Role;

    #[test]
    fn test_span_names() {
        assert_eq!(SPAN_OPERATION, "ticket.operation");
        assert_eq!(SPAN_SWEEP, "ticket.sweep");
        assert!(FIELD_TICKET_ID.starts_with("ticket."));
    }

    #[test]
    fn test_record_outcome_without_subscriber() {
        let actor = Actor::new("TRI1", Role::TriageOfficer);
        let span = operation_span("triage", Some("TKT00001"), &actor);
        let result: crate::error::TicketResult<()> = Err(TicketError::EmptyAssignment);
        record_outcome(&span, &result);
        record_sweep(&sweep_span(), &SweepReport::default());
    }
}
