//! Core rate limiter implementation.
//!
//! Fixed-window counting against the shared store: one atomic increment per
//! request, with the window boundary defined by a TTL set exactly once on
//! the first increment. The limiter holds no in-process counter state, so
//! any number of service instances sharing a store enforce a single limit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::store::{CounterStore, StoreError};

use super::policy::{RateLimitPolicy, RequestContext};

/// Outcome of a rate limit evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed. Carries quota metadata for observability
    /// headers.
    Proceed {
        /// The configured limit
        limit: u32,
        /// Requests left in the current window
        remaining: u32,
        /// Upper bound on time until the window resets
        reset_after: Duration,
    },
    /// The request exceeded the limit and should be rejected.
    Reject {
        /// Seconds the caller should wait before retrying
        retry_after: Duration,
        /// Human-readable rejection text
        message: String,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Proceed { .. })
    }
}

/// A rate limit guard for a single policy.
///
/// Stateless in-process and cheap to clone; all coordination happens through
/// the store's atomic increment.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    /// Create a limiter enforcing `policy` against `store`.
    pub fn new(store: Arc<dyn CounterStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Evaluate a request against the policy.
    ///
    /// Never fails: any store error degrades to [`Decision::Proceed`], because
    /// availability of the protected service takes priority over perfect rate
    /// enforcement. The error is logged as a warning and otherwise invisible
    /// to the caller.
    pub async fn evaluate(&self, ctx: &RequestContext) -> Decision {
        match self.evaluate_strict(ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    error = %e,
                    ip = %ctx.ip,
                    path = %ctx.path,
                    "Rate limit store unavailable, failing open"
                );
                self.full_quota()
            }
        }
    }

    /// Evaluate a request, surfacing store errors to the caller.
    ///
    /// Exposed for callers that want to observe store degradation; request
    /// handling should go through [`evaluate`](Self::evaluate).
    pub async fn evaluate_strict(
        &self,
        ctx: &RequestContext,
    ) -> Result<Decision, StoreError> {
        if self.policy.skips(ctx) {
            trace!(ip = %ctx.ip, path = %ctx.path, "Request exempt from rate limit");
            return Ok(self.full_quota());
        }

        let key = self.policy.key_strategy().key(ctx);
        let window_secs = self.policy.window_secs();

        trace!(key = %key, "Checking rate limit");

        let count = self.store.incr(&key).await?;

        // The key was just created: set its TTL, defining the window
        // boundary. Subsequent increments must never touch the TTL or the
        // window would slide indefinitely under sustained load. The atomic
        // increment guarantees exactly one caller observes count == 1.
        if count == 1 {
            debug!(key = %key, window_secs, "Starting new rate limit window");
            self.store
                .expire(&key, Duration::from_secs(window_secs))
                .await?;
        }

        let window = Duration::from_secs(window_secs);
        if count > i64::from(self.policy.max_requests()) {
            debug!(key = %key, count, "Rate limit exceeded");
            return Ok(Decision::Reject {
                retry_after: window,
                message: self.policy.message().to_string(),
            });
        }

        let remaining = self
            .policy
            .max_requests()
            .saturating_sub(count.try_into().unwrap_or(u32::MAX));

        Ok(Decision::Proceed {
            limit: self.policy.max_requests(),
            remaining,
            reset_after: window,
        })
    }

    fn full_quota(&self) -> Decision {
        Decision::Proceed {
            limit: self.policy.max_requests(),
            remaining: self.policy.max_requests(),
            reset_after: Duration::from_secs(self.policy.window_secs()),
        }
    }
}
