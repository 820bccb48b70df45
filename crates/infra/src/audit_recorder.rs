//! Audit/event recorder.
//!
//! Ledger services write their audit records inside the same `ChangeSet` as
//! the mutation they describe (see `ChangeSet::record`), so a failed audit
//! write aborts the mutation. `record` here is the standalone append for
//! callers outside those services; reads are simple filtered queries.

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use finken_core::ActorId;
use finken_events::{
    ActionType, AuditEntity, EventLogFilter, EventLogPage, EventLogRecord, NewEventLog, Pagination,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{ChangeSet, LedgerStore};

#[derive(Debug, Clone)]
pub struct AuditRecorder<S> {
    store: S,
}

impl<S> AuditRecorder<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append one record. Fails only when the store is unavailable.
    #[instrument(skip(self, before, after))]
    pub fn record<T: Serialize>(
        &self,
        actor: ActorId,
        action: ActionType,
        entity: AuditEntity,
        record_id: &str,
        before: Option<&T>,
        after: Option<&T>,
    ) -> LedgerResult<EventLogRecord> {
        let log = NewEventLog::capture(actor, Utc::now(), action, entity, record_id, before, after)?;
        let mut changes = ChangeSet::new();
        changes.record(log);
        self.store
            .commit(changes)?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("event log write was not acknowledged".to_string()))
    }

    pub fn query_events(&self, filter: &EventLogFilter, pagination: Pagination) -> LedgerResult<EventLogPage> {
        Ok(self.store.event_logs(filter, pagination)?)
    }

    /// Events on chart-of-accounts records; `filter.entity` is overridden.
    pub fn account_events(&self, filter: EventLogFilter, pagination: Pagination) -> LedgerResult<EventLogPage> {
        self.for_entity(AuditEntity::Account, filter, pagination)
    }

    /// Events on journal entries; `filter.entity` is overridden.
    pub fn journal_events(&self, filter: EventLogFilter, pagination: Pagination) -> LedgerResult<EventLogPage> {
        self.for_entity(AuditEntity::JournalEntry, filter, pagination)
    }

    fn for_entity(
        &self,
        entity: AuditEntity,
        filter: EventLogFilter,
        pagination: Pagination,
    ) -> LedgerResult<EventLogPage> {
        let filter = EventLogFilter {
            entity: Some(entity),
            ..filter
        };
        self.query_events(&filter, pagination)
    }
}
