//! Configuration management for Gatehouse.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatehouseError, Result};
use crate::lockout::LockoutConfig;
use crate::ratelimit::RateLimitPolicy;
use crate::store::RedisStoreConfig;

/// Main configuration for the Gatehouse subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatehouseConfig {
    /// Shared counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Strict policy for authentication endpoints
    #[serde(default = "PolicyConfig::login_default")]
    pub login_policy: PolicyConfig,

    /// Lenient policy for general API traffic
    #[serde(default = "PolicyConfig::api_default")]
    pub api_policy: PolicyConfig,

    /// Account lockout configuration
    #[serde(default)]
    pub lockout: LockoutSettings,
}

/// Shared counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Prefix applied to every key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Per-operation deadline in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            key_prefix: default_key_prefix(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_key_prefix() -> String {
    "gatehouse:".to_string()
}

fn default_op_timeout_ms() -> u64 {
    100
}

/// Limit and window values for one rate limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl PolicyConfig {
    fn login_default() -> Self {
        // 5 attempts per 15 minutes
        Self {
            max_requests: 5,
            window_secs: 900,
        }
    }

    fn api_default() -> Self {
        // 100 requests per 15 minutes
        Self {
            max_requests: 100,
            window_secs: 900,
        }
    }
}

/// Account lockout thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutSettings {
    /// Consecutive failures that trigger a lock
    #[serde(default = "default_lockout_threshold")]
    pub threshold: u32,

    /// Lock duration in seconds
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,

    /// Rolling TTL on the failure counter, in seconds
    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            threshold: default_lockout_threshold(),
            lockout_duration_secs: default_lockout_duration_secs(),
            counter_ttl_secs: default_counter_ttl_secs(),
        }
    }
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_lockout_duration_secs() -> u64 {
    30 * 60
}

fn default_counter_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            login_policy: PolicyConfig::login_default(),
            api_policy: PolicyConfig::api_default(),
            lockout: LockoutSettings::default(),
        }
    }
}

impl GatehouseConfig {
    /// Load configuration from a YAML file, validating it.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string, validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatehouseConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GatehouseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject misconfiguration at startup rather than misbehaving
    /// per-request.
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [("login_policy", &self.login_policy), ("api_policy", &self.api_policy)] {
            if policy.max_requests == 0 {
                return Err(GatehouseError::Config(format!(
                    "{}: max_requests must be positive",
                    name
                )));
            }
            if policy.window_secs == 0 {
                return Err(GatehouseError::Config(format!(
                    "{}: window_secs must be positive",
                    name
                )));
            }
        }
        if self.lockout.threshold == 0 {
            return Err(GatehouseError::Config(
                "lockout: threshold must be positive".to_string(),
            ));
        }
        if self.lockout.lockout_duration_secs == 0 {
            return Err(GatehouseError::Config(
                "lockout: lockout_duration_secs must be positive".to_string(),
            ));
        }
        if self.store.op_timeout_ms == 0 {
            return Err(GatehouseError::Config(
                "store: op_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the login rate limit policy from this configuration.
    pub fn login_policy(&self) -> Result<RateLimitPolicy> {
        RateLimitPolicy::login(
            self.login_policy.max_requests,
            Duration::from_secs(self.login_policy.window_secs),
        )
    }

    /// Build the general API rate limit policy from this configuration.
    pub fn api_policy(&self) -> Result<RateLimitPolicy> {
        RateLimitPolicy::api(
            self.api_policy.max_requests,
            Duration::from_secs(self.api_policy.window_secs),
        )
    }

    /// Build the lockout configuration.
    pub fn lockout_config(&self) -> LockoutConfig {
        LockoutConfig {
            threshold: self.lockout.threshold,
            lockout_duration: Duration::from_secs(self.lockout.lockout_duration_secs),
            counter_ttl: Duration::from_secs(self.lockout.counter_ttl_secs),
        }
    }

    /// Build the Redis store configuration.
    pub fn redis_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            key_prefix: self.store.key_prefix.clone(),
            op_timeout: Duration::from_millis(self.store.op_timeout_ms),
        }
    }
}
