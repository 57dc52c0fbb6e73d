//! Account lockout for repeated authentication failures.

mod manager;

pub use manager::{LockoutConfig, LockoutManager, LockoutStatus};
