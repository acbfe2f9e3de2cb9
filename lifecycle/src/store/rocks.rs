//! RocksDB-backed ticket store
//!
//! One column family per record kind (see [`schema`](super::schema)).
//! Values are JSON so records stay readable with `ldb`. A commit is a single
//! `WriteBatch`: the ticket, its new log entries and the idempotency record
//! land together or not at all.

use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};

use super::schema::{self, keys, ALL_CFS};
use super::{Commit, IdempotencyRecord, StoreError, StoreResult, TicketStore};
use crate::activity::ActivityLogEntry;
use crate::model::{Team, Ticket, User};

pub struct RocksStore {
    db: RwLock<DB>,
    path: PathBuf,
    /// Serializes read-modify-write of the ticket counter
    counter: Mutex<()>,
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
}

fn cf<'a>(db: &'a DB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
}

impl RocksStore {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;

        Ok(Self {
            db: RwLock::new(db),
            path,
            counter: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = cf(&db, cf_name)?;
        db.put_cf(handle, key.as_bytes(), encode(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = cf(&db, cf_name)?;
        match db.get_cf(handle, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All values whose key starts with `prefix`, in key order
    fn scan<T: DeserializeOwned>(&self, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let handle = cf(&db, cf_name)?;
        let mut values = Vec::new();
        let iter = db.iterator_cf(
            handle,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(decode(&value)?);
        }
        Ok(values)
    }
}

impl TicketStore for RocksStore {
    fn next_ticket_number(&self) -> StoreResult<u64> {
        let _guard = self.counter.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current: u64 = self
            .get(schema::CF_META, keys::TICKET_COUNTER)?
            .unwrap_or(0);
        let next = current + 1;
        self.put(schema::CF_META, keys::TICKET_COUNTER, &next)?;
        Ok(next)
    }

    fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        self.get(schema::CF_TICKETS, &keys::ticket(id))
    }

    fn list_tickets(&self) -> StoreResult<Vec<Ticket>> {
        self.scan(schema::CF_TICKETS, keys::TICKET_PREFIX)
    }

    fn entries(&self, ticket_id: &str) -> StoreResult<Vec<ActivityLogEntry>> {
        self.scan(schema::CF_ACTIVITY, &keys::activity_prefix(ticket_id))
    }

    fn commit(&self, commit: Commit) -> StoreResult<()> {
        let stored = self
            .get_ticket(&commit.ticket.id)?
            .map(|t| t.log_sequence)
            .unwrap_or(0);
        commit.check_sequence(stored)?;

        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut batch = WriteBatch::default();

        let tickets = cf(&db, schema::CF_TICKETS)?;
        batch.put_cf(
            tickets,
            keys::ticket(&commit.ticket.id).as_bytes(),
            encode(&commit.ticket)?,
        );

        let activity = cf(&db, schema::CF_ACTIVITY)?;
        for entry in &commit.entries {
            batch.put_cf(
                activity,
                keys::activity(&entry.ticket_id, entry.sequence).as_bytes(),
                encode(entry)?,
            );
        }

        if let Some(record) = &commit.idempotency {
            let idem = cf(&db, schema::CF_IDEMPOTENCY)?;
            batch.put_cf(idem, keys::idempotency(&record.key).as_bytes(), encode(record)?);
        }

        db.write(batch)?;
        Ok(())
    }

    fn idempotency(&self, key: &str) -> StoreResult<Option<IdempotencyRecord>> {
        self.get(schema::CF_IDEMPOTENCY, &keys::idempotency(key))
    }

    fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.get(schema::CF_USERS, &keys::user(id))
    }

    fn put_user(&self, user: &User) -> StoreResult<()> {
        self.put(schema::CF_USERS, &keys::user(&user.id), user)
    }

    fn list_users(&self) -> StoreResult<Vec<User>> {
        self.scan(schema::CF_USERS, keys::USER_PREFIX)
    }

    fn get_team(&self, lead_id: &str) -> StoreResult<Option<Team>> {
        self.get(schema::CF_TEAMS, &keys::team(lead_id))
    }

    fn put_team(&self, team: &Team) -> StoreResult<()> {
        self.put(schema::CF_TEAMS, &keys::team(&team.lead_id), team)
    }

    fn list_teams(&self) -> StoreResult<Vec<Team>> {
        self.scan(schema::CF_TEAMS, keys::TEAM_PREFIX)
    }
}
