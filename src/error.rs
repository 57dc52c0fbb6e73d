//! Error types for the Gatehouse subsystem.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Gatehouse operations.
///
/// Store failures never reach request handling through this type: the rate
/// limiter and lockout manager convert them into "allow" decisions at their
/// fail-open boundaries. This error surfaces only from construction-time
/// paths (configuration loading, policy validation, store connection).
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared counter store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Gatehouse operations.
pub type Result<T> = std::result::Result<T, GatehouseError>;
