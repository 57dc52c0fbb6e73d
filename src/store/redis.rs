//! Redis-backed shared counter store.
//!
//! Production implementation of [`CounterStore`] for multi-instance
//! deployments. Uses `redis::aio::ConnectionManager` for automatic
//! reconnection. Every operation goes through a bounded timeout so a
//! degraded store can never stall request handling; timeouts and backend
//! errors both surface as [`StoreError`] and are handled fail-open by the
//! callers.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tracing::debug;

use super::{CounterStore, StoreError};

/// Configuration for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Prefix applied to every key (default: "gatehouse:")
    pub key_prefix: String,
    /// Per-operation deadline (default: 100ms)
    pub op_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "gatehouse:".to_string(),
            op_timeout: Duration::from_millis(100),
        }
    }
}

/// Redis-backed implementation of [`CounterStore`].
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl RedisStore {
    /// Connect to Redis with default configuration.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with_config(url, RedisStoreConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStoreConfig,
    ) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(StoreError::from)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(StoreError::from)?;

        debug!(key_prefix = %config.key_prefix, "Connected to Redis store");

        Ok(Self { connection, config })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Run a store operation under the configured deadline.
    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, RedisError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.config.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.incr(&key, 1).await }).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let key = self.key(key);
        let secs = ttl.as_secs().max(1) as i64;
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.expire(&key, secs).await })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.get(&key).await }).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let key = self.key(key);
        let value = value.to_string();
        let mut conn = self.connection.clone();
        self.bounded(async move {
            match ttl {
                Some(ttl) => conn.set_ex(&key, value, ttl.as_secs().max(1)).await,
                None => conn.set(&key, value).await,
            }
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.del(&key).await }).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        let secs: i64 = self
            .bounded(async move { conn.ttl(&key).await })
            .await?;

        // Redis returns -2 for a missing key and -1 for a key without expiry.
        if secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }
}
