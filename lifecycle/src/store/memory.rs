//! In-memory store
//!
//! All state lives behind one `RwLock`; a commit is a single write-locked
//! section, so readers never observe a ticket without its log entries.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{Commit, IdempotencyRecord, StoreError, StoreResult, TicketStore};
use crate::activity::ActivityLogEntry;
use crate::model::{Team, Ticket, User};

#[derive(Debug, Default)]
struct Inner {
    ticket_counter: u64,
    tickets: BTreeMap<String, Ticket>,
    entries: HashMap<String, Vec<ActivityLogEntry>>,
    idempotency: HashMap<String, IdempotencyRecord>,
    users: BTreeMap<String, User>,
    teams: BTreeMap<String, Team>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryStore {
    fn next_ticket_number(&self) -> StoreResult<u64> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        inner.ticket_counter += 1;
        Ok(inner.ticket_counter)
    }

    fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.tickets.get(id).cloned())
    }

    fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.tickets.values().cloned().collect())
    }

    fn entries(&self, ticket_id: &str) -> StoreResult<Vec<ActivityLogEntry>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.entries.get(ticket_id).cloned().unwrap_or_default())
    }

    fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = inner
            .tickets
            .get(&commit.ticket.id)
            .map(|t| t.log_sequence)
            .unwrap_or(0);
        commit.check_sequence(stored)?;

        let Commit {
            ticket,
            entries,
            idempotency,
        } = commit;
        if let Some(record) = idempotency {
            inner.idempotency.insert(record.key.clone(), record);
        }
        inner
            .entries
            .entry(ticket.id.clone())
            .or_default()
            .extend(entries);
        inner.tickets.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    fn idempotency(&self, key: &str) -> StoreResult<Option<IdempotencyRecord>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.idempotency.get(key).cloned())
    }

    fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.users.get(id).cloned())
    }

    fn put_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.users.values().cloned().collect())
    }

    fn get_team(&self, lead_id: &str) -> StoreResult<Option<Team>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.teams.get(lead_id).cloned())
    }

    fn put_team(&self, team: &Team) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        inner.teams.insert(team.lead_id.clone(), team.clone());
        Ok(())
    }

    fn list_teams(&self) -> StoreResult<Vec<Team>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.teams.values().cloned().collect())
    }
}
