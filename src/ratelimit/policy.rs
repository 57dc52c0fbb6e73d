//! Rate limit policy configuration.
//!
//! A policy is an immutable value object constructed once at startup and
//! shared freely across requests. Misconfiguration (zero limit, zero window)
//! is rejected at construction so the service refuses to start rather than
//! silently misbehaving per-request.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GatehouseError, Result};

/// Identifying attributes of an inbound request, as seen by the limiter.
///
/// The HTTP layer builds one of these per request; the subsystem never sees
/// the framework's own request type.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Caller IP address
    pub ip: IpAddr,
    /// Route path being requested
    pub path: String,
    /// Request-supplied account identifier (e.g. the email on a login form)
    pub account: Option<String>,
}

impl RequestContext {
    /// Create a context with no account identifier.
    pub fn new(ip: IpAddr, path: impl Into<String>) -> Self {
        Self {
            ip,
            path: path.into(),
            account: None,
        }
    }

    /// Attach an account identifier to the context.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// Strategy for deriving a store key from a request.
///
/// Kept as an enum rather than a bare closure so policies stay inspectable
/// and comparable in configuration and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Key by caller IP only.
    IpOnly,
    /// Key by caller IP and route path.
    IpAndPath,
    /// Key by the request's account identifier, falling back to the caller
    /// IP when the request carries none (degraded key, never a failure).
    AccountOrIp,
}

impl KeyStrategy {
    /// Generate the store key for a request.
    pub fn key(&self, ctx: &RequestContext) -> String {
        match self {
            KeyStrategy::IpOnly => format!("rl:ip:{}", ctx.ip),
            KeyStrategy::IpAndPath => format!("rl:ip:{}:{}", ctx.ip, ctx.path),
            KeyStrategy::AccountOrIp => match &ctx.account {
                Some(account) => format!("rl:acct:{}", account.to_lowercase()),
                None => format!("rl:ip:{}", ctx.ip),
            },
        }
    }
}

/// Predicate deciding whether a request is exempt from a policy.
pub type SkipPredicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Configuration for a single rate limit.
///
/// Stateless and immutable; all counter state lives in the shared store.
#[derive(Clone)]
pub struct RateLimitPolicy {
    max_requests: u32,
    window: Duration,
    key_strategy: KeyStrategy,
    skip: Option<SkipPredicate>,
    message: String,
}

impl fmt::Debug for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitPolicy")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("key_strategy", &self.key_strategy)
            .field("skip", &self.skip.is_some())
            .field("message", &self.message)
            .finish()
    }
}

impl RateLimitPolicy {
    /// Create a policy, validating its configuration.
    pub fn new(
        max_requests: u32,
        window: Duration,
        key_strategy: KeyStrategy,
        message: impl Into<String>,
    ) -> Result<Self> {
        if max_requests == 0 {
            return Err(GatehouseError::Config(
                "rate limit max_requests must be positive".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(GatehouseError::Config(
                "rate limit window must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_requests,
            window,
            key_strategy,
            skip: None,
            message: message.into(),
        })
    }

    /// Strict policy for authentication attempts, keyed by account
    /// identifier with IP fallback.
    pub fn login(max_requests: u32, window: Duration) -> Result<Self> {
        Self::new(
            max_requests,
            window,
            KeyStrategy::AccountOrIp,
            "Too many authentication attempts, please try again later.",
        )
    }

    /// Lenient policy for general API traffic, keyed by IP and path.
    pub fn api(max_requests: u32, window: Duration) -> Result<Self> {
        Self::new(
            max_requests,
            window,
            KeyStrategy::IpAndPath,
            "Too many requests from this IP, please try again later.",
        )
    }

    /// Attach a skip predicate; matching requests bypass the limiter.
    pub fn with_skip(mut self, skip: SkipPredicate) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Maximum requests allowed per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length as configured.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole seconds, rounded up, for store expiry.
    pub fn window_secs(&self) -> u64 {
        let secs = self.window.as_secs();
        if self.window.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }

    /// The key generation strategy.
    pub fn key_strategy(&self) -> KeyStrategy {
        self.key_strategy
    }

    /// Rejection message shown to the caller.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a request is exempt from this policy.
    pub fn skips(&self, ctx: &RequestContext) -> bool {
        match &self.skip {
            Some(skip) => skip.as_ref()(ctx),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ip: &str, path: &str) -> RequestContext {
        RequestContext::new(ip.parse().unwrap(), path)
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let result = RateLimitPolicy::new(0, Duration::from_secs(60), KeyStrategy::IpOnly, "no");
        assert!(matches!(result, Err(GatehouseError::Config(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = RateLimitPolicy::new(10, Duration::ZERO, KeyStrategy::IpOnly, "no");
        assert!(matches!(result, Err(GatehouseError::Config(_))));
    }

    #[test]
    fn test_window_secs_rounds_up() {
        let policy =
            RateLimitPolicy::new(10, Duration::from_millis(1500), KeyStrategy::IpOnly, "no")
                .unwrap();
        assert_eq!(policy.window_secs(), 2);

        let policy =
            RateLimitPolicy::new(10, Duration::from_secs(60), KeyStrategy::IpOnly, "no").unwrap();
        assert_eq!(policy.window_secs(), 60);
    }

    #[test]
    fn test_key_strategies() {
        let request = ctx("10.0.0.1", "/api/login");

        assert_eq!(KeyStrategy::IpOnly.key(&request), "rl:ip:10.0.0.1");
        assert_eq!(
            KeyStrategy::IpAndPath.key(&request),
            "rl:ip:10.0.0.1:/api/login"
        );

        // No account attribute: degraded IP-only key, not a failure
        assert_eq!(KeyStrategy::AccountOrIp.key(&request), "rl:ip:10.0.0.1");

        let request = request.with_account("User@Example.com");
        assert_eq!(
            KeyStrategy::AccountOrIp.key(&request),
            "rl:acct:user@example.com"
        );
    }

    #[test]
    fn test_skip_predicate() {
        let policy = RateLimitPolicy::new(10, Duration::from_secs(60), KeyStrategy::IpOnly, "no")
            .unwrap()
            .with_skip(Arc::new(|ctx| ctx.path == "/health"));

        assert!(policy.skips(&ctx("10.0.0.1", "/health")));
        assert!(!policy.skips(&ctx("10.0.0.1", "/api/users")));
    }
}
