//! Ticket persistence
//!
//! The service talks to storage only through [`TicketStore`]. Two
//! implementations exist:
//!
//! - [`MemoryStore`]: the default, a single `RwLock`-guarded map set
//! - `RocksStore` (feature `persistent`): RocksDB column families, one per
//!   record kind, with JSON-encoded values
//!
//! # Atomicity
//!
//! Each service operation ends in exactly one [`TicketStore::commit`] that
//! carries the ticket snapshot, the staged log entries and an optional
//! idempotency record. Implementations must apply all of it or none of it.

pub mod memory;
#[cfg(feature = "persistent")]
pub mod rocks;
pub mod schema;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityLogEntry;
use crate::model::{Team, Ticket, TicketId, User, UserId};

pub use memory::MemoryStore;
#[cfg(feature = "persistent")]
pub use rocks::RocksStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "persistent")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Commit rejected because the log would not continue the stored sequence
    #[error("Sequence conflict on {ticket_id}: stored {stored}, next {next}")]
    SequenceConflict {
        ticket_id: String,
        stored: u64,
        next: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Remembers which ticket a client-supplied idempotency key produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    /// blake3 hex digest of the original request
    pub fingerprint: String,
    pub ticket_id: TicketId,
    pub created_at: DateTime<Utc>,
}

/// Everything one operation writes
#[derive(Debug, Clone)]
pub struct Commit {
    pub ticket: Ticket,
    pub entries: Vec<ActivityLogEntry>,
    pub idempotency: Option<IdempotencyRecord>,
}

impl Commit {
    pub fn new(ticket: Ticket, entries: Vec<ActivityLogEntry>) -> Self {
        Self {
            ticket,
            entries,
            idempotency: None,
        }
    }

    pub fn with_idempotency(mut self, record: IdempotencyRecord) -> Self {
        self.idempotency = Some(record);
        self
    }

    /// Entries must be contiguous and end at the ticket's sequence number.
    pub(crate) fn check_sequence(&self, stored: u64) -> StoreResult<()> {
        let mut expected = stored;
        for entry in &self.entries {
            expected += 1;
            if entry.sequence != expected {
                return Err(StoreError::SequenceConflict {
                    ticket_id: self.ticket.id.clone(),
                    stored,
                    next: entry.sequence,
                });
            }
        }
        if expected != self.ticket.log_sequence {
            return Err(StoreError::SequenceConflict {
                ticket_id: self.ticket.id.clone(),
                stored,
                next: self.ticket.log_sequence,
            });
        }
        Ok(())
    }
}

/// Storage backend for tickets, their logs and the user/team directory
pub trait TicketStore: Send + Sync {
    /// Reserve the next ticket number; numbers are never reused.
    fn next_ticket_number(&self) -> StoreResult<u64>;

    fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>>;

    fn list_tickets(&self) -> StoreResult<Vec<Ticket>>;

    /// All entries for a ticket, in sequence order
    fn entries(&self, ticket_id: &str) -> StoreResult<Vec<ActivityLogEntry>>;

    /// Apply ticket snapshot, log entries and idempotency record atomically
    fn commit(&self, commit: Commit) -> StoreResult<()>;

    fn idempotency(&self, key: &str) -> StoreResult<Option<IdempotencyRecord>>;

    fn get_user(&self, id: &str) -> StoreResult<Option<User>>;

    fn put_user(&self, user: &User) -> StoreResult<()>;

    fn list_users(&self) -> StoreResult<Vec<User>>;

    fn get_team(&self, lead_id: &str) -> StoreResult<Option<Team>>;

    fn put_team(&self, team: &Team) -> StoreResult<()>;

    fn list_teams(&self) -> StoreResult<Vec<Team>>;

    /// Team whose member list contains `user_id`
    fn team_of(&self, user_id: &UserId) -> StoreResult<Option<Team>> {
        Ok(self
            .list_teams()?
            .into_iter()
            .find(|t| t.is_member(user_id)))
    }
}

/// Shared reference to a store
pub type SharedStore = Arc<dyn TicketStore>;
