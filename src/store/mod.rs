//! Shared counter/state store abstraction.
//!
//! Both the rate limiter and the lockout manager keep all durable state in an
//! external key-value store with atomic increment and per-key expiry. The
//! store is the single shared mutable resource in the subsystem; correctness
//! relies entirely on its atomic primitives, never on in-process locking.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{RedisStore, RedisStoreConfig};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the shared counter store.
///
/// Callers at the request path treat every variant as non-fatal: the rate
/// limiter fails open and the lockout manager assumes "not locked".
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store did not respond within the configured deadline.
    #[error("store operation timed out")]
    Timeout,

    /// The store returned an error or the response was malformed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Trait for shared counter store implementations.
///
/// Abstracts over the Redis-backed production store and the in-memory store
/// used for single-instance deployments and tests. Every method is a single
/// network round trip on the production implementation and must be wrapped
/// with a bounded timeout there.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the integer at `key` by 1, creating it at 0
    /// first if absent. Returns the post-increment value.
    ///
    /// Concurrent increments on the same key are serialized by the store;
    /// exactly one caller observes any given return value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set or overwrite the TTL on an existing key.
    ///
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Get the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set `key` to `value`, with an optional TTL applied atomically.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Remaining TTL for `key`, or `None` if the key is absent or has no
    /// expiry set.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}
