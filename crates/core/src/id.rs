//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an actor (a user profile owned by the external identity service).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ActorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for ActorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for ActorId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::validation(format!("ActorId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Sequential integer identifiers handed out by the store (like database sequences).
macro_rules! impl_serial_id {
    ($t:ident, $name:literal) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))
            }
        }
    };
}

impl_serial_id!(AccountId, "AccountId");
impl_serial_id!(JournalEntryId, "JournalEntryId");
impl_serial_id!(MovementId, "MovementId");
impl_serial_id!(EventLogId, "EventLogId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_ids_parse_and_display() {
        let id: AccountId = " 42 ".parse().unwrap();
        assert_eq!(id, AccountId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<JournalEntryId>().is_err());
    }

    #[test]
    fn serial_ids_serialize_transparently() {
        let json = serde_json::to_string(&JournalEntryId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
