use finken_auth::Role;
use finken_core::ActorId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the auth middleware; every protected handler can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    actor: ActorId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(actor: ActorId, roles: Vec<Role>) -> Self {
        Self { actor, roles }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
