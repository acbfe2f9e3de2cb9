//! Per-ticket SLA clock and the source of "now"

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current time.
///
/// Production code uses [`SystemClock`]; tests drive a [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// SLA obligation attached to a ticket.
///
/// `deadline` is always `started_at + duration`. While `paused_at` is set
/// the remaining time is frozen at `deadline - paused_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaClock {
    pub started_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    /// Set once by the sweeper when the deadline passes
    #[serde(default)]
    pub breached: bool,
    /// Set once by the sweeper when the ticket enters the at-risk window
    #[serde(default)]
    pub at_risk_flagged: bool,
}

impl SlaClock {
    pub fn start(started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            started_at,
            duration_secs: duration.num_seconds(),
            deadline: started_at + duration,
            paused_at: None,
            breached: false,
            at_risk_flagged: false,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn is_running(&self) -> bool {
        self.paused_at.is_none()
    }

    /// Time left until the deadline; negative once breached.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let reference = self.paused_at.unwrap_or(now);
        self.deadline - reference
    }

    /// `0 < remaining <= threshold`
    pub fn at_risk(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let remaining = self.remaining(now);
        remaining > Duration::zero() && remaining <= threshold
    }

    pub fn is_breached(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) < Duration::zero()
    }

    /// Apply a new policy duration after a priority change; the start is kept.
    /// A sweep flag survives only while the new deadline still warrants it,
    /// so a breach or at-risk warning is never announced twice.
    pub fn retriage(&mut self, duration: Duration, now: DateTime<Utc>, threshold: Duration) {
        self.duration_secs = duration.num_seconds();
        self.deadline = self.started_at + duration;
        let breached = self.is_breached(now);
        self.breached = self.breached && breached;
        self.at_risk_flagged = self.at_risk_flagged && (breached || self.at_risk(now, threshold));
    }

    /// Freeze the clock. A second pause keeps the first pause time.
    pub fn pause(&mut self, at: DateTime<Utc>) {
        if self.paused_at.is_none() {
            self.paused_at = Some(at);
        }
    }

    /// Restart from `now` with a fresh duration, clearing breach state.
    pub fn resume(&mut self, now: DateTime<Utc>, duration: Duration) {
        *self = Self::start(now, duration);
    }
}
