//! Audit trail records.
//!
//! Every mutation of an account, journal entry or ledger movement produces one
//! `EventLogRecord` carrying before/after images of the affected record. Records
//! are written in the same commit as the change they describe and are never
//! updated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use finken_core::{ActorId, EventLogId};

use crate::Event;

/// Kind of mutation recorded in the trail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Approve,
    Reject,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "Create",
            ActionType::Update => "Update",
            ActionType::Delete => "Delete",
            ActionType::Approve => "Approve",
            ActionType::Reject => "Reject",
        }
    }
}

impl core::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(ActionType::Create),
            "update" => Ok(ActionType::Update),
            "delete" => Ok(ActionType::Delete),
            "approve" => Ok(ActionType::Approve),
            "reject" => Ok(ActionType::Reject),
            other => Err(format!("unknown action type '{other}'")),
        }
    }
}

/// The table/entity a record describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    Account,
    JournalEntry,
    LedgerMovement,
}

impl AuditEntity {
    pub fn table_name(&self) -> &'static str {
        match self {
            AuditEntity::Account => "chart_of_accounts",
            AuditEntity::JournalEntry => "journal_entries",
            AuditEntity::LedgerMovement => "account_ledger",
        }
    }
}

impl core::str::FromStr for AuditEntity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" | "chart_of_accounts" => Ok(AuditEntity::Account),
            "journal_entry" | "journal_entries" => Ok(AuditEntity::JournalEntry),
            "ledger_movement" | "account_ledger" => Ok(AuditEntity::LedgerMovement),
            other => Err(format!("unknown audit entity '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to snapshot record for the event log: {0}")]
pub struct SnapshotError(#[from] serde_json::Error);

/// An audit record ready to be written (not yet assigned an id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEventLog {
    pub actor: ActorId,
    pub timestamp: DateTime<Utc>,
    pub action: ActionType,
    pub entity: AuditEntity,
    pub record_id: String,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

impl NewEventLog {
    /// Capture a change from typed before/after images.
    pub fn capture<T: Serialize>(
        actor: ActorId,
        timestamp: DateTime<Utc>,
        action: ActionType,
        entity: AuditEntity,
        record_id: impl ToString,
        before: Option<&T>,
        after: Option<&T>,
    ) -> Result<Self, SnapshotError> {
        Ok(Self {
            actor,
            timestamp,
            action,
            entity,
            record_id: record_id.to_string(),
            before: before.map(serde_json::to_value).transpose()?,
            after: after.map(serde_json::to_value).transpose()?,
        })
    }

    /// Capture a change caused by a domain event; action and time come from the event.
    pub fn from_event<E, T>(
        actor: ActorId,
        event: &E,
        entity: AuditEntity,
        record_id: impl ToString,
        before: Option<&T>,
        after: Option<&T>,
    ) -> Result<Self, SnapshotError>
    where
        E: Event,
        T: Serialize,
    {
        Self::capture(
            actor,
            event.occurred_at(),
            event.action(),
            entity,
            record_id,
            before,
            after,
        )
    }
}

/// A committed audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogRecord {
    pub id: EventLogId,
    pub actor: ActorId,
    pub timestamp: DateTime<Utc>,
    pub action: ActionType,
    pub entity: AuditEntity,
    pub record_id: String,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

impl EventLogRecord {
    pub fn from_new(id: EventLogId, new: NewEventLog) -> Self {
        Self {
            id,
            actor: new.actor,
            timestamp: new.timestamp,
            action: new.action,
            entity: new.entity,
            record_id: new.record_id,
            before: new.before,
            after: new.after,
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.entity.table_name()
    }
}
