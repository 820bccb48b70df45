use thiserror::Error;

use crate::permissions::ledger;
use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: actor may not approve or reject journal entries")]
    ApprovalDenied,
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// The "may approve" capability consulted by the journal lifecycle.
///
/// The bookkeeping core never compares role names; it asks an injected policy.
pub trait ApprovalPolicy: Send + Sync {
    fn can_approve(&self, principal: &Principal) -> bool;

    fn ensure_can_approve(&self, principal: &Principal) -> Result<(), AuthzError> {
        if self.can_approve(principal) {
            Ok(())
        } else {
            Err(AuthzError::ApprovalDenied)
        }
    }
}

impl<F> ApprovalPolicy for F
where
    F: Fn(&Principal) -> bool + Send + Sync,
{
    fn can_approve(&self, principal: &Principal) -> bool {
        self(principal)
    }
}

/// Approval granted to principals holding a given permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    required: Permission,
}

impl PermissionPolicy {
    pub fn new(required: Permission) -> Self {
        Self { required }
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::new(ledger::JOURNAL_APPROVE)
    }
}

impl ApprovalPolicy for PermissionPolicy {
    fn can_approve(&self, principal: &Principal) -> bool {
        principal.has_permission(&self.required)
    }
}
