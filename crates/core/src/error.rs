//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, bookkeeping failures (validation,
/// lifecycle, invariants). Storage concerns belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or unbalanced input. Recoverable by resubmission.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal lifecycle transition (e.g. approving a rejected entry).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// State changed underneath the operation; safe to retry after re-reading.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An invariant that must always hold was violated (bug or corruption).
    #[error("consistency violated: {0}")]
    Consistency(String),

    /// The actor lacks the capability required for the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
