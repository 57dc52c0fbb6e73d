//! Fixed-window request rate limiting.

mod limiter;
mod policy;

pub use limiter::{Decision, RateLimiter};
pub use policy::{KeyStrategy, RateLimitPolicy, RequestContext, SkipPredicate};
