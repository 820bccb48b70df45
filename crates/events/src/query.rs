//! Event log query interface for inspection.
//!
//! Reads are filtered and paginated; they are not on any hot path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finken_core::ActorId;

use crate::audit::{ActionType, AuditEntity, EventLogRecord};

/// Pagination parameters for event log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Filter criteria for event log queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogFilter {
    pub entity: Option<AuditEntity>,
    pub record_id: Option<String>,
    pub actor: Option<ActorId>,
    pub action: Option<ActionType>,
    /// Records at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Records at or before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl EventLogFilter {
    pub fn for_entity(entity: AuditEntity) -> Self {
        Self {
            entity: Some(entity),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &EventLogRecord) -> bool {
        self.entity.is_none_or(|e| e == record.entity)
            && self
                .record_id
                .as_deref()
                .is_none_or(|id| id == record.record_id)
            && self.actor.is_none_or(|a| a == record.actor)
            && self.action.is_none_or(|a| a == record.action)
            && self.since.is_none_or(|t| record.timestamp >= t)
            && self.until.is_none_or(|t| record.timestamp <= t)
    }
}

/// Paginated event log query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogPage {
    /// Records matching the query, newest first.
    pub records: Vec<EventLogRecord>,
    /// Total number of records matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl EventLogPage {
    /// Filter, order newest-first (ties broken by id, descending) and paginate.
    pub fn collect<'a>(
        records: impl IntoIterator<Item = &'a EventLogRecord>,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Self {
        let mut matching: Vec<&EventLogRecord> =
            records.into_iter().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let records: Vec<EventLogRecord> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

        Self {
            records,
            total,
            pagination,
            has_more,
        }
    }
}
