// In-memory lease store
// DashMap-backed, with lazy expiry so that expired keys behave as absent

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use crate::LeaseStore;
use crate::error::Result;

/// A stored lease value
#[derive(Debug, Clone)]
struct LeaseEntry {
    value: String,
    expires_at: Instant,
}

impl LeaseEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn is_live_with(&self, token: &str) -> bool {
        !self.is_expired() && self.value == token
    }
}

/// In-process lease store.
///
/// Clones share the same underlying map, so several lock handles can
/// contend on one store exactly like separate processes on one Redis.
/// Time is read from `tokio::time`, which keeps paused-clock tests exact.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseStore {
    entries: Arc<DashMap<String, LeaseEntry>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live key
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Remaining time-to-live of a live key
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Unconditionally set `key = value` with a time-to-live (plain `SET PX`)
    pub fn insert(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .insert(key.to_string(), LeaseEntry::new(value, ttl));
    }

    /// Unconditionally delete a key, returning whether a live value was removed
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired())
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(self.entries.len());

        if purged > 0 {
            debug!(count = purged, "Purged expired lease entries");
        }
        purged
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(LeaseEntry::new(token, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LeaseEntry::new(token, ttl));
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.is_live_with(token))
            .is_some())
    }

    async fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live_with(token) => {
                entry.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
