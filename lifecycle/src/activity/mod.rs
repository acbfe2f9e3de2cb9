//! Append-only activity log
//!
//! Every mutation stages one or more [`ActivityLogEntry`] values through an
//! [`ActivityRecorder`]; the service commits them together with the ticket
//! snapshot and then publishes them on the [`EventBus`].

pub mod bus;
pub mod recorder;
pub mod types;

pub use bus::{EventBus, SharedEventBus, TicketEvent};
pub use recorder::ActivityRecorder;
pub use types::{
    ActivityLogEntry, ActivityType, Page, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
