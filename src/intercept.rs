//! HTTP-boundary contracts.
//!
//! The subsystem never touches the host framework's request or response
//! types. Instead it exposes framework-agnostic values the application layer
//! adapts to its router: a request interceptor wrapping the rate limiter, and
//! a login gate wrapping the lockout manager, consulted before credential
//! verification and reported to after it.

use serde_json::json;
use tracing::warn;

use crate::lockout::{LockoutManager, LockoutStatus};
use crate::ratelimit::{Decision, RateLimiter, RequestContext};

/// What the HTTP layer should do with an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptOutcome {
    /// Whether the request may continue to business logic
    pub allow: bool,
    /// Response status code, when the request is rejected
    pub status: Option<u16>,
    /// Response headers to attach (set on both allowed and rejected requests)
    pub headers: Vec<(String, String)>,
    /// JSON response body, when the request is rejected
    pub body: Option<serde_json::Value>,
}

impl InterceptOutcome {
    /// Standard rejection for a request against a locked account.
    pub fn account_locked(remaining_seconds: u64) -> Self {
        Self {
            allow: false,
            status: Some(423),
            headers: Vec::new(),
            body: Some(json!({
                "message": "Account locked. Please try again later.",
                "retryAfter": remaining_seconds,
            })),
        }
    }
}

/// Rate-limiting interceptor sitting in front of every guarded route.
#[derive(Clone)]
pub struct RequestInterceptor {
    limiter: RateLimiter,
}

impl RequestInterceptor {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    /// Evaluate a request and translate the decision into response shape.
    ///
    /// Rejections are HTTP 429 with a JSON body and the standard
    /// `X-RateLimit-*` headers; allowed requests carry the same headers so
    /// clients can observe their remaining quota.
    pub async fn intercept(&self, ctx: &RequestContext) -> InterceptOutcome {
        match self.limiter.evaluate(ctx).await {
            Decision::Proceed {
                limit,
                remaining,
                reset_after,
            } => InterceptOutcome {
                allow: true,
                status: None,
                headers: rate_limit_headers(limit, remaining, reset_after.as_secs()),
                body: None,
            },
            Decision::Reject {
                retry_after,
                message,
            } => {
                let retry_secs = retry_after.as_secs();
                InterceptOutcome {
                    allow: false,
                    status: Some(429),
                    headers: rate_limit_headers(
                        self.limiter.policy().max_requests(),
                        0,
                        retry_secs,
                    ),
                    body: Some(json!({
                        "message": message,
                        "retryAfter": retry_secs,
                    })),
                }
            }
        }
    }
}

fn rate_limit_headers(limit: u32, remaining: u32, reset_secs: u64) -> Vec<(String, String)> {
    vec![
        ("X-RateLimit-Limit".to_string(), limit.to_string()),
        ("X-RateLimit-Remaining".to_string(), remaining.to_string()),
        ("X-RateLimit-Reset".to_string(), reset_secs.to_string()),
    ]
}

/// Result of a pre-authentication lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockCheck {
    /// Whether the account is currently locked
    pub locked: bool,
    /// Seconds until the lock expires, if locked
    pub remaining_seconds: Option<u64>,
}

/// Lockout gate for the login flow.
///
/// Consulted *before* credential verification so locked accounts
/// short-circuit without touching the credential store, and reported to
/// *after* verification with the outcome.
#[derive(Clone)]
pub struct LoginGate {
    lockout: LockoutManager,
}

impl LoginGate {
    pub fn new(lockout: LockoutManager) -> Self {
        Self { lockout }
    }

    /// Check whether an account is locked, before verifying credentials.
    pub async fn check_locked(&self, account_id: &str) -> LockCheck {
        let status = self.lockout.status(account_id).await;
        LockCheck {
            locked: status.locked,
            remaining_seconds: status.remaining_seconds,
        }
    }

    /// Report the outcome of a credential verification.
    ///
    /// A failure records a failed attempt (possibly triggering a lock); a
    /// success resets the failure counter. Returns the account's resulting
    /// status.
    pub async fn report_outcome(&self, account_id: &str, success: bool) -> LockoutStatus {
        if success {
            if let Err(e) = self.lockout.reset_failed_attempts(account_id).await {
                warn!(
                    error = %e,
                    account = %account_id,
                    "Failed to reset failure counter after successful login"
                );
            }
            self.lockout.status(account_id).await
        } else {
            self.lockout.record_failed_attempt(account_id).await
        }
    }
}
