// src/utils/errors.rs
//! Crate-wide error type
//!
//! Every subsystem maps its failures into [`AgentError`]. Errors are logged
//! at the boundary and never propagate into the host as a panic.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration is missing, invalid, or already frozen
    #[error("configuration failed: {0}")]
    ConfigFailed(String),

    /// Caller-supplied input was rejected
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Outbound delivery failed (beacon rejected, request error, non-2xx)
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Replay pipeline failure (recorder, batch encoding, flush)
    #[error("replay failed: {0}")]
    ReplayFailed(String),

    /// Persisted key-value storage failure
    #[error("storage failed: {0}")]
    StorageFailed(String),
}
