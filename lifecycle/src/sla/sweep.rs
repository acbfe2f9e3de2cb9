//! Background SLA sweep
//!
//! Periodically scans open tickets and flags those that entered the at-risk
//! window or passed their deadline. Each flag is set at most once per clock
//! run, so a repeated sweep never re-fires a notification. Busy tickets are
//! skipped (`try_lock`) and picked up on the next cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use crate::activity::{SharedEventBus, TicketEvent};
use crate::locks::KeyedLocks;
use crate::model::Ticket;
use crate::otel;
use crate::store::{Commit, SharedStore, StoreResult};

/// Sweep counters
#[derive(Debug, Default)]
pub struct SweepMetrics {
    sweeps: AtomicU64,
    scanned: AtomicU64,
    at_risk_flagged: AtomicU64,
    breaches_flagged: AtomicU64,
    skipped_busy: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepMetricsSnapshot {
    pub sweeps: u64,
    pub scanned: u64,
    pub at_risk_flagged: u64,
    pub breaches_flagged: u64,
    pub skipped_busy: u64,
    pub failures: u64,
}

impl SweepMetrics {
    pub fn snapshot(&self) -> SweepMetricsSnapshot {
        SweepMetricsSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            scanned: self.scanned.load(Ordering::Relaxed),
            at_risk_flagged: self.at_risk_flagged.load(Ordering::Relaxed),
            breaches_flagged: self.breaches_flagged.load(Ordering::Relaxed),
            skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Result of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub at_risk: Vec<String>,
    pub breached: Vec<String>,
    pub skipped_busy: usize,
    pub failures: usize,
}

/// What a ticket needs from the sweep right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finding {
    Breached,
    AtRisk,
}

fn finding(ticket: &Ticket, now: DateTime<Utc>, threshold: Duration) -> Option<Finding> {
    if !ticket.status.is_open() || !ticket.sla.is_running() {
        return None;
    }
    if ticket.sla.is_breached(now) && !ticket.sla.breached {
        Some(Finding::Breached)
    } else if ticket.sla.at_risk(now, threshold) && !ticket.sla.at_risk_flagged {
        Some(Finding::AtRisk)
    } else {
        None
    }
}

pub struct Sweeper {
    store: SharedStore,
    locks: Arc<KeyedLocks>,
    bus: SharedEventBus,
    clock: Arc<dyn Clock>,
    threshold: Duration,
    metrics: Arc<SweepMetrics>,
}

impl Sweeper {
    pub fn new(
        store: SharedStore,
        locks: Arc<KeyedLocks>,
        bus: SharedEventBus,
        clock: Arc<dyn Clock>,
        threshold: Duration,
        metrics: Arc<SweepMetrics>,
    ) -> Self {
        Self {
            store,
            locks,
            bus,
            clock,
            threshold,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<SweepMetrics> {
        self.metrics.clone()
    }

    /// Scan every open ticket once.
    pub fn sweep_once(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        self.metrics.sweeps.fetch_add(1, Ordering::Relaxed);

        let tickets = match self.store.list_tickets() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "SLA sweep could not list tickets");
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                report.failures += 1;
                return report;
            }
        };

        for ticket in tickets {
            report.scanned += 1;
            self.metrics.scanned.fetch_add(1, Ordering::Relaxed);
            if finding(&ticket, now, self.threshold).is_none() {
                continue;
            }

            let Some(_guard) = self.locks.try_lock(&ticket.id) else {
                debug!(ticket_id = %ticket.id, "Ticket busy, deferring to next sweep");
                self.metrics.skipped_busy.fetch_add(1, Ordering::Relaxed);
                report.skipped_busy += 1;
                continue;
            };

            match self.flag(&ticket.id, now) {
                Ok(Some(Finding::Breached)) => report.breached.push(ticket.id.clone()),
                Ok(Some(Finding::AtRisk)) => report.at_risk.push(ticket.id.clone()),
                Ok(None) => {}
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "SLA sweep failed to flag ticket");
                    self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    report.failures += 1;
                }
            }
        }

        report
    }

    /// Re-read under the ticket lock and set the flag if still needed.
    fn flag(&self, ticket_id: &str, now: DateTime<Utc>) -> StoreResult<Option<Finding>> {
        let Some(mut ticket) = self.store.get_ticket(ticket_id)? else {
            return Ok(None);
        };
        let Some(found) = finding(&ticket, now, self.threshold) else {
            return Ok(None);
        };

        let event = match found {
            Finding::Breached => {
                ticket.sla.breached = true;
                ticket.sla.at_risk_flagged = true;
                TicketEvent::SlaBreached {
                    ticket_id: ticket.id.clone(),
                    deadline: ticket.sla.deadline,
                    detected_at: now,
                }
            }
            Finding::AtRisk => {
                ticket.sla.at_risk_flagged = true;
                TicketEvent::SlaAtRisk {
                    ticket_id: ticket.id.clone(),
                    remaining_secs: ticket.sla.remaining(now).num_seconds(),
                    detected_at: now,
                }
            }
        };

        self.store.commit(Commit::new(ticket, Vec::new()))?;
        match found {
            Finding::Breached => {
                self.metrics.breaches_flagged.fetch_add(1, Ordering::Relaxed);
                info!(ticket_id, "SLA breached");
            }
            Finding::AtRisk => {
                self.metrics.at_risk_flagged.fetch_add(1, Ordering::Relaxed);
                info!(ticket_id, "SLA at risk");
            }
        }
        self.bus.publish(event);
        Ok(Some(found))
    }

    /// Sweep on `interval` until `cancel` fires. Each pass runs on the
    /// blocking pool since store reads are synchronous.
    pub async fn run(self, interval: StdDuration, cancel: CancellationToken) {
        let sweeper = Arc::new(self);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "SLA sweeper started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("SLA sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let worker = sweeper.clone();
                    let pass = tokio::task::spawn_blocking(move || {
                        let span = otel::sweep_span();
                        let report = span.in_scope(|| worker.sweep_once());
                        otel::record_sweep(&span, &report);
                    });
                    if let Err(e) = pass.await {
                        warn!(error = %e, "SLA sweep pass panicked");
                        sweeper.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }
}
