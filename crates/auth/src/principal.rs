use serde::{Deserialize, Serialize};

use finken_core::ActorId;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives the
/// permissions from token roles, tests build principals directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub actor: ActorId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(actor: ActorId, roles: Vec<Role>, permissions: Vec<Permission>) -> Self {
        Self {
            actor,
            roles,
            permissions,
        }
    }

    /// A principal holding the wildcard permission (system jobs, fixtures).
    pub fn superuser(actor: ActorId) -> Self {
        Self::new(actor, vec![Role::ADMINISTRATOR], vec![Permission::WILDCARD])
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == required)
    }
}
