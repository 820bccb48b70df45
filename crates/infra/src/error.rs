//! Service-level error taxonomy.
//!
//! Domain, store and authorization failures all funnel into `LedgerError`,
//! which is what callers (the HTTP layer, tests) match on.

use thiserror::Error;

use finken_auth::AuthzError;
use finken_core::DomainError;
use finken_events::SnapshotError;

use crate::ledger_store::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or unbalanced input; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal lifecycle transition.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent mutation invalidated the operation; retry after re-reading.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An invariant that must always hold is broken. Not retryable.
    #[error("consistency violated: {0}")]
    Consistency(String),

    /// Persistence unavailable; the operation had no effect.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::InvalidState(_) => "invalid_state",
            LedgerError::Authorization(_) => "forbidden",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Consistency(_) => "consistency_error",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(m) => LedgerError::Validation(m),
            DomainError::InvalidState(m) => LedgerError::InvalidState(m),
            DomainError::NotFound(m) => LedgerError::NotFound(m),
            DomainError::Conflict(m) => LedgerError::Conflict(m),
            DomainError::Consistency(m) => LedgerError::Consistency(m),
            DomainError::Unauthorized(m) => LedgerError::Authorization(m),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(m) => LedgerError::Conflict(m),
            StoreError::UniqueViolation(m) => LedgerError::Validation(m),
            StoreError::Unavailable(m) => LedgerError::Storage(m),
            StoreError::Corrupt(m) => LedgerError::Consistency(m),
        }
    }
}

impl From<AuthzError> for LedgerError {
    fn from(value: AuthzError) -> Self {
        LedgerError::Authorization(value.to_string())
    }
}

impl From<SnapshotError> for LedgerError {
    fn from(value: SnapshotError) -> Self {
        LedgerError::Storage(value.to_string())
    }
}
