//! API-side authorization guard.
//!
//! Tokens carry roles; the ledger only understands permissions. This module is
//! the one place roles are mapped to permissions, before any service is called.
//! Approval rights are not checked here: the journal service consults its own
//! `ApprovalPolicy` with the resolved principal.

use finken_auth::permissions::ledger;
use finken_auth::{AuthzError, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

/// Resolve the request's principal and check one permission.
pub fn authorize_request(
    context: &PrincipalContext,
    required: &Permission,
) -> Result<Principal, AuthzError> {
    let principal = principal_from_context(context);
    authorize(&principal, required)?;
    Ok(principal)
}

pub fn principal_from_context(context: &PrincipalContext) -> Principal {
    Principal::new(
        context.actor(),
        context.roles().to_vec(),
        permissions_from_roles(context.roles()),
    )
}

/// Role→permission mapping. Unknown roles grant nothing.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.is(&Role::ADMINISTRATOR)) {
        return vec![Permission::WILDCARD];
    }

    let mut granted: Vec<Permission> = Vec::new();
    let mut grant = |perms: &[Permission]| {
        for p in perms {
            if !granted.contains(p) {
                granted.push(p.clone());
            }
        }
    };

    for role in roles {
        if role.is(&Role::MANAGER) {
            grant(&[
                ledger::JOURNAL_CREATE,
                ledger::JOURNAL_APPROVE,
                ledger::ACCOUNTS_READ,
                ledger::REPORTS_READ,
                ledger::AUDIT_READ,
            ]);
        } else if role.is(&Role::ACCOUNTANT) {
            grant(&[ledger::JOURNAL_CREATE, ledger::ACCOUNTS_READ, ledger::REPORTS_READ]);
        }
    }

    granted
}
