//! SLA clock, duration policy and background sweep

pub mod clock;
pub mod policy;
pub mod sweep;

pub use clock::{Clock, ManualClock, SlaClock, SystemClock};
pub use policy::{CategoryOverride, PriorityDuration, SlaPolicy, MAX_SLA_HOURS};
pub use sweep::{SweepMetrics, SweepMetricsSnapshot, SweepReport, Sweeper};
