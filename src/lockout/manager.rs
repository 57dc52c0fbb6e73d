//! Account lockout manager.
//!
//! Accumulates failed-authentication signals per account in the shared store
//! and escalates into a temporary lock once a threshold is crossed. State is
//! two independent store entries per account: a failure counter with a long
//! rolling TTL, and a lock marker holding the unlock timestamp, present only
//! while the account is locked.
//!
//! Lock expiry is discovered lazily at read time by comparing the stored
//! unlock timestamp against the current time; the marker's store TTL is
//! best-effort cleanup, not the correctness mechanism, since TTL eviction
//! visibility can lag on some backends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::{CounterStore, StoreError};

/// Configuration for account lockout.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock (default: 5)
    pub threshold: u32,
    /// How long a triggered lock lasts (default: 30 minutes)
    pub lockout_duration: Duration,
    /// Rolling TTL on the failure counter, bounding how long stale failure
    /// counts persist (default: 24 hours)
    pub counter_ttl: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            lockout_duration: Duration::from_secs(30 * 60),
            counter_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Transient view of an account's lockout state.
///
/// Computed from the store on each query; never held durably in process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockoutStatus {
    /// Whether the account is currently locked
    pub locked: bool,
    /// Consecutive failed attempts since the last reset
    pub failed_attempts: u32,
    /// When the lock expires, if locked
    pub unlock_at: Option<DateTime<Utc>>,
    /// Seconds until the lock expires, if locked
    pub remaining_seconds: Option<u64>,
}

impl LockoutStatus {
    fn clear() -> Self {
        Self {
            locked: false,
            failed_attempts: 0,
            unlock_at: None,
            remaining_seconds: None,
        }
    }

    fn accumulating(failed_attempts: u32) -> Self {
        Self {
            locked: false,
            failed_attempts,
            unlock_at: None,
            remaining_seconds: None,
        }
    }

    fn locked(failed_attempts: u32, unlock_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (unlock_at - now).num_seconds().max(0) as u64;
        Self {
            locked: true,
            failed_attempts,
            unlock_at: Some(unlock_at),
            remaining_seconds: Some(remaining),
        }
    }
}

/// Stateful guard that locks accounts after repeated authentication
/// failures.
///
/// All methods that sit on the login path are fail-open: if the store is
/// unreachable they assume "not locked" and log a warning, so a degraded
/// store never denies service to legitimate users. This trades strictness
/// for availability deliberately.
#[derive(Clone)]
pub struct LockoutManager {
    store: Arc<dyn CounterStore>,
    config: LockoutConfig,
}

impl LockoutManager {
    /// Create a manager with the given configuration.
    pub fn new(store: Arc<dyn CounterStore>, config: LockoutConfig) -> Self {
        Self { store, config }
    }

    /// Create a manager with default thresholds.
    pub fn with_defaults(store: Arc<dyn CounterStore>) -> Self {
        Self::new(store, LockoutConfig::default())
    }

    /// The lockout configuration.
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    fn counter_key(account_id: &str) -> String {
        format!("lockout:failed:{}", account_id.to_lowercase())
    }

    fn marker_key(account_id: &str) -> String {
        format!("lockout:locked:{}", account_id.to_lowercase())
    }

    /// Record a failed authentication attempt for an account.
    ///
    /// Already-locked accounts are returned unchanged; the failure counter is
    /// frozen while a lock is active so repeated attempts against a locked
    /// account cannot extend its state. Fails open to a clear status on store
    /// errors.
    pub async fn record_failed_attempt(&self, account_id: &str) -> LockoutStatus {
        match self.record_failed_attempt_strict(account_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    error = %e,
                    account = %account_id,
                    "Lockout store unavailable, not counting failed attempt"
                );
                LockoutStatus::clear()
            }
        }
    }

    async fn record_failed_attempt_strict(
        &self,
        account_id: &str,
    ) -> Result<LockoutStatus, StoreError> {
        // Best-effort read-then-act: a failed attempt slipping through right
        // at the lock boundary only affects the counter's cosmetic accuracy,
        // the account is still correctly locked.
        if let Some(status) = self.read_active_lock(account_id).await? {
            return Ok(status);
        }

        let counter_key = Self::counter_key(account_id);
        let count = self.store.incr(&counter_key).await?;
        if count == 1 {
            self.store
                .expire(&counter_key, self.config.counter_ttl)
                .await?;
        }

        let failed_attempts = count.try_into().unwrap_or(u32::MAX);
        if failed_attempts < self.config.threshold {
            return Ok(LockoutStatus::accumulating(failed_attempts));
        }

        // Threshold crossed: persist the lock marker. Two racing attempts
        // may both write it with slightly different unlock times; the
        // narrower window wins, which is safe.
        let now = Utc::now();
        let unlock_at = now
            + chrono::Duration::from_std(self.config.lockout_duration)
                .unwrap_or_else(|_| chrono::Duration::seconds(30 * 60));
        self.store
            .set(
                &Self::marker_key(account_id),
                &unlock_at.timestamp().to_string(),
                Some(self.config.lockout_duration),
            )
            .await?;

        debug!(
            account = %account_id,
            failed_attempts,
            unlock_at = %unlock_at,
            "Account locked after repeated authentication failures"
        );

        Ok(LockoutStatus::locked(failed_attempts, unlock_at, now))
    }

    /// Query an account's lockout state.
    ///
    /// Discovers expired locks lazily: a marker whose unlock time has passed
    /// is cleaned up as if [`unlock`](Self::unlock) had been called, and the
    /// account is reported clear. Fails open to "not locked" on store errors.
    pub async fn status(&self, account_id: &str) -> LockoutStatus {
        match self.status_strict(account_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    error = %e,
                    account = %account_id,
                    "Lockout store unavailable, assuming account not locked"
                );
                LockoutStatus::clear()
            }
        }
    }

    async fn status_strict(&self, account_id: &str) -> Result<LockoutStatus, StoreError> {
        if let Some(status) = self.read_active_lock(account_id).await? {
            return Ok(status);
        }

        let count = self.read_counter(account_id).await?;
        if count == 0 {
            Ok(LockoutStatus::clear())
        } else {
            Ok(LockoutStatus::accumulating(count))
        }
    }

    /// Unlock an account: delete the lock marker and reset the failure
    /// counter.
    ///
    /// Used for explicit administrative unlock; the same cleanup runs
    /// internally when an expired lock is discovered.
    pub async fn unlock(&self, account_id: &str) -> Result<(), StoreError> {
        self.store.del(&Self::marker_key(account_id)).await?;
        self.store.del(&Self::counter_key(account_id)).await?;
        debug!(account = %account_id, "Account unlocked");
        Ok(())
    }

    /// Reset the failure counter after a successful authentication.
    pub async fn reset_failed_attempts(&self, account_id: &str) -> Result<(), StoreError> {
        self.store.del(&Self::counter_key(account_id)).await
    }

    /// Read the lock marker, returning a locked status if the lock is still
    /// active and cleaning up if it has expired.
    async fn read_active_lock(
        &self,
        account_id: &str,
    ) -> Result<Option<LockoutStatus>, StoreError> {
        let marker = self.store.get(&Self::marker_key(account_id)).await?;
        let Some(marker) = marker else {
            return Ok(None);
        };

        let unlock_at = marker
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        let Some(unlock_at) = unlock_at else {
            // Malformed marker: treat as expired and clean up
            warn!(account = %account_id, "Discarding malformed lock marker");
            self.unlock(account_id).await?;
            return Ok(None);
        };

        let now = Utc::now();
        if unlock_at <= now {
            debug!(account = %account_id, "Lock expired, cleaning up lazily");
            self.unlock(account_id).await?;
            return Ok(None);
        }

        let failed_attempts = self.read_counter(account_id).await?;
        Ok(Some(LockoutStatus::locked(failed_attempts, unlock_at, now)))
    }

    async fn read_counter(&self, account_id: &str) -> Result<u32, StoreError> {
        let value = self.store.get(&Self::counter_key(account_id)).await?;
        Ok(value
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
            Err(StoreError::Timeout)
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Timeout)
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Timeout)
        }
        async fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Timeout)
        }
        async fn del(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Timeout)
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
            Err(StoreError::Timeout)
        }
    }

    fn manager(store: Arc<MemoryStore>) -> LockoutManager {
        LockoutManager::with_defaults(store)
    }

    #[tokio::test]
    async fn test_failures_accumulate_below_threshold() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for expected in 1..=4u32 {
            let status = manager.record_failed_attempt("alice").await;
            assert!(!status.locked);
            assert_eq!(status.failed_attempts, expected);
        }
    }

    #[tokio::test]
    async fn test_fifth_failure_locks() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..4 {
            manager.record_failed_attempt("alice").await;
        }

        let status = manager.record_failed_attempt("alice").await;
        assert!(status.locked);
        assert_eq!(status.failed_attempts, 5);

        let unlock_at = status.unlock_at.expect("locked status carries unlock_at");
        let remaining = (unlock_at - Utc::now()).num_seconds();
        // Roughly lockout_duration in the future
        assert!((1790..=1800).contains(&remaining), "remaining = {}", remaining);
    }

    #[tokio::test]
    async fn test_no_double_counting_while_locked() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..5 {
            manager.record_failed_attempt("alice").await;
        }

        let status = manager.record_failed_attempt("alice").await;
        assert!(status.locked);
        assert_eq!(status.failed_attempts, 5);

        let status = manager.record_failed_attempt("alice").await;
        assert_eq!(status.failed_attempts, 5);
    }

    #[tokio::test]
    async fn test_counter_ttl_set_on_first_failure() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(Arc::clone(&store));

        manager.record_failed_attempt("alice").await;
        assert_eq!(
            store.ttl("lockout:failed:alice").await.unwrap(),
            Some(Duration::from_secs(24 * 60 * 60))
        );
    }

    #[tokio::test]
    async fn test_lazy_expiry_clears_account() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(Arc::clone(&store));

        // Plant an already-expired lock marker, as if the store's TTL
        // eviction were lagging behind wall-clock expiry.
        let past = (Utc::now() - chrono::Duration::seconds(10)).timestamp();
        store
            .set(
                "lockout:locked:alice",
                &past.to_string(),
                Some(Duration::from_secs(300)),
            )
            .await
            .unwrap();
        store
            .set("lockout:failed:alice", "5", None)
            .await
            .unwrap();

        let status = manager.status("alice").await;
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 0);

        // Counting starts over from 1
        let status = manager.record_failed_attempt("alice").await;
        assert_eq!(status.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_status_reports_active_lock() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..5 {
            manager.record_failed_attempt("alice").await;
        }

        let status = manager.status("alice").await;
        assert!(status.locked);
        assert_eq!(status.failed_attempts, 5);
        let remaining = status.remaining_seconds.unwrap();
        assert!(remaining > 0 && remaining <= 1800);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..3 {
            manager.record_failed_attempt("alice").await;
        }

        manager.reset_failed_attempts("alice").await.unwrap();

        let status = manager.status("alice").await;
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_explicit_unlock() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..5 {
            manager.record_failed_attempt("alice").await;
        }
        assert!(manager.status("alice").await.locked);

        manager.unlock("alice").await.unwrap();

        let status = manager.status("alice").await;
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_accounts_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        for _ in 0..5 {
            manager.record_failed_attempt("alice").await;
        }
        assert!(manager.status("alice").await.locked);
        assert!(!manager.status("bob").await.locked);
    }

    #[tokio::test]
    async fn test_account_ids_are_case_insensitive() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store);

        manager.record_failed_attempt("Alice@Example.com").await;
        let status = manager.status("alice@example.com").await;
        assert_eq!(status.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unreachable() {
        let manager = LockoutManager::with_defaults(Arc::new(UnreachableStore));

        let status = manager.status("alice").await;
        assert!(!status.locked);

        let status = manager.record_failed_attempt("alice").await;
        assert!(!status.locked);
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let store = Arc::new(MemoryStore::new());
        let manager = LockoutManager::new(
            store,
            LockoutConfig {
                threshold: 2,
                ..LockoutConfig::default()
            },
        );

        assert!(!manager.record_failed_attempt("alice").await.locked);
        assert!(manager.record_failed_attempt("alice").await.locked);
    }
}
