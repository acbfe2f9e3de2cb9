//! Keyed async locks
//!
//! One `tokio::sync::Mutex` per key (ticket id, team lead id, idempotency
//! key), created on demand. Entries nobody holds or waits on are pruned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Prune idle entries once the table grows past this size
const PRUNE_THRESHOLD: usize = 1024;

pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|p| p.into_inner());
        if table.len() >= PRUNE_THRESHOLD {
            table.retain(|_, m| Arc::strong_count(m) > 1);
        }
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Exclusive access if nobody holds `key` right now
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        self.slot(key).try_lock_owned().ok()
    }

    /// Drop entries that are neither held nor awaited
    pub fn prune(&self) {
        let mut table = self.table.lock().unwrap_or_else(|p| p.into_inner());
        table.retain(|_, m| Arc::strong_count(m) > 1);
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
