use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "journal.approve").
/// A special wildcard permission `"*"` can be used by policy layers to indicate
/// "allow all" without hardcoding domain permissions into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permissions understood by the bookkeeping services and the HTTP surface.
pub mod ledger {
    use super::Permission;

    pub const ACCOUNTS_READ: Permission = Permission::from_static("accounts.read");
    pub const ACCOUNTS_MANAGE: Permission = Permission::from_static("accounts.manage");
    pub const JOURNAL_CREATE: Permission = Permission::from_static("journal.create");
    pub const JOURNAL_APPROVE: Permission = Permission::from_static("journal.approve");
    pub const REPORTS_READ: Permission = Permission::from_static("reports.read");
    pub const AUDIT_READ: Permission = Permission::from_static("audit.read");
}
