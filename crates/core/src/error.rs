//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Mutation endpoints surface `Conflict` distinctly from `Validation` so
/// clients can decide whether to retry with a refreshed version or fix their
/// payload. Infrastructure failures are folded into `Internal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A requested entity (or a referenced parent/sibling) is absent.
    #[error("not found")]
    NotFound,

    /// Optimistic concurrency failure: the stored version did not match the
    /// caller's expected version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A malformed action payload or schema violation. Recoverable; the
    /// message carries the offending field path where one exists.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Store or transport failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
