//! In-memory shared counter store.
//!
//! Single-instance implementation of [`CounterStore`], also used as the test
//! double throughout the crate. Entries expire lazily: a deadline in the past
//! is treated as absence on the next access, which mirrors how the subsystem
//! is allowed to observe a Redis key (TTL eviction visibility is best-effort,
//! read-time comparison is the source of truth).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CounterStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory implementation of [`CounterStore`] backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    /// Artificial clock offset, advanced by tests to simulate elapsed time.
    offset: Mutex<Duration>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the store's clock, expiring entries whose TTL has elapsed.
    ///
    /// This is primarily useful for testing window expiry without waiting
    /// in real time.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += duration;
    }

    fn now(&self) -> Instant {
        Instant::now() + *self.offset.lock().unwrap()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new("0".to_string()));

        if entry.expired(now) {
            *entry = Entry::new("0".to_string());
        }

        let count = entry
            .value
            .parse::<i64>()
            .map_err(|_| StoreError::Backend(format!("value at {} is not an integer", key)))?
            + 1;
        entry.value = count.to_string();
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.now();
        match self.entries.get(key) {
            Some(entry) if !entry.expired(now) => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = self.now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| now + ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.now();
        match self.entries.get(key) {
            Some(entry) if !entry.expired(now) => {
                Ok(entry.expires_at.map(|deadline| deadline - now))
            }
            _ => Ok(None),
        }
    }
}
