//! SLA duration policy
//!
//! Durations come from configuration:
//!
//! ```toml
//! [[sla.policy]]
//! priority = "CRITICAL"
//! hours = 4
//!
//! [[sla.override]]
//! priority = "HIGH"
//! category = "HARDWARE"
//! hours = 24
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{Category, Priority};

/// Base SLA duration for one priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityDuration {
    pub priority: Priority,
    pub hours: i64,
}

/// Duration override for a (priority, category) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOverride {
    pub priority: Priority,
    pub category: Category,
    pub hours: i64,
}

/// Priority → duration table with per-category overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    #[serde(default = "default_policy")]
    pub policy: Vec<PriorityDuration>,
    #[serde(default, rename = "override")]
    pub overrides: Vec<CategoryOverride>,
}

fn default_policy() -> Vec<PriorityDuration> {
    vec![
        PriorityDuration {
            priority: Priority::Critical,
            hours: 4,
        },
        PriorityDuration {
            priority: Priority::High,
            hours: 8,
        },
        PriorityDuration {
            priority: Priority::Medium,
            hours: 12,
        },
        PriorityDuration {
            priority: Priority::Low,
            hours: 24,
        },
    ]
}

/// Used when a priority is missing from a partial table
const FALLBACK_HOURS: i64 = 24;

/// Longest SLA a policy row may grant: ten years
pub const MAX_SLA_HOURS: i64 = 10 * 366 * 24;

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            overrides: Vec::new(),
        }
    }
}

impl SlaPolicy {
    pub fn duration_for(&self, priority: Priority, category: Category) -> Duration {
        let hours = self
            .overrides
            .iter()
            .find(|o| o.priority == priority && o.category == category)
            .map(|o| o.hours)
            .or_else(|| {
                self.policy
                    .iter()
                    .find(|p| p.priority == priority)
                    .map(|p| p.hours)
            })
            .unwrap_or(FALLBACK_HOURS);
        Duration::hours(hours.clamp(1, MAX_SLA_HOURS))
    }

    /// Reject out-of-range durations and duplicate rows
    pub fn validate(&self) -> Result<(), String> {
        for p in &self.policy {
            if !(1..=MAX_SLA_HOURS).contains(&p.hours) {
                return Err(format!(
                    "SLA hours for {} must be between 1 and {}",
                    p.priority, MAX_SLA_HOURS
                ));
            }
        }
        for o in &self.overrides {
            if !(1..=MAX_SLA_HOURS).contains(&o.hours) {
                return Err(format!(
                    "SLA override for {}/{} must be between 1 and {} hours",
                    o.priority, o.category, MAX_SLA_HOURS
                ));
            }
        }
        for (i, p) in self.policy.iter().enumerate() {
            if self.policy[i + 1..].iter().any(|q| q.priority == p.priority) {
                return Err(format!("duplicate SLA policy for {}", p.priority));
            }
        }
        Ok(())
    }
}
