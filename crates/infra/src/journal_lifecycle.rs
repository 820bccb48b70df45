//! Journal entry lifecycle manager.
//!
//! `Pending → Approved` and `Pending → Rejected`, nothing else. Approval and
//! posting are one commit: the entry write is guarded by its version (a
//! compare-and-set on status), the account writes by theirs, so of two
//! reviewers acting on the same entry exactly one wins and the other re-reads a
//! non-Pending entry and gets `InvalidState`.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use finken_accounting::{
    EntryStatus, JournalCommand, JournalEntry, JournalEvent, NewJournalEntry,
};
use finken_auth::{ApprovalPolicy, Principal};
use finken_core::{ActorId, ExpectedVersion, JournalEntryId};
use finken_events::{AuditEntity, NewEventLog, execute};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{ChangeSet, LedgerStore, StoreError};
use crate::posting_engine::PostingEngine;
use crate::retry::commit_with_retry;

/// Journal listing filter. Unset fields match everything; dates are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalFilter {
    pub status: Option<EntryStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Option<ActorId>,
}

impl JournalFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.is_none_or(|s| s == entry.status)
            && self.start_date.is_none_or(|d| entry.date >= d)
            && self.end_date.is_none_or(|d| entry.date <= d)
            && self.created_by.is_none_or(|a| a == entry.created_by)
    }
}

pub struct JournalService<S, P> {
    store: S,
    posting: PostingEngine<S>,
    policy: P,
    config: LedgerConfig,
}

impl<S, P> JournalService<S, P>
where
    S: LedgerStore + Clone,
    P: ApprovalPolicy,
{
    pub fn new(store: S, policy: P, config: LedgerConfig) -> Self {
        Self {
            posting: PostingEngine::new(store.clone()),
            store,
            policy,
            config,
        }
    }

    /// Validate and persist a Pending entry. Account balances are untouched.
    #[instrument(skip(self, new), fields(date = %new.date, lines = new.lines.len()))]
    pub fn create_entry(&self, actor: ActorId, new: NewJournalEntry) -> LedgerResult<JournalEntry> {
        if new.reverses.is_some() {
            return Err(LedgerError::Validation(
                "reversal links are set by reversing an approved entry".to_string(),
            ));
        }
        self.insert(actor, &new)
    }

    /// Approve a Pending entry and post it, atomically.
    #[instrument(skip(self, principal), fields(actor = %principal.actor))]
    pub fn approve_entry(&self, principal: &Principal, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.policy.ensure_can_approve(principal)?;
        let reviewer = principal.actor;

        let (entry, records) = commit_with_retry(&self.store, &self.config, "approve_entry", || {
            let at = Utc::now();
            let (before, after, events) =
                self.transition(id, JournalCommand::Approve { reviewer, at })?;

            let mut changes = self.audited_entry_write(reviewer, &before, &after, &events)?;
            changes.merge(self.posting.post(&after, reviewer)?);
            Ok((changes, after))
        })?;

        info!(entry_id = %id, audit_records = records.len(), "journal entry approved and posted");
        Ok(entry)
    }

    /// Reject a Pending entry. No ledger effect.
    #[instrument(skip(self, principal, reason), fields(actor = %principal.actor))]
    pub fn reject_entry(
        &self,
        principal: &Principal,
        id: JournalEntryId,
        reason: &str,
    ) -> LedgerResult<JournalEntry> {
        self.policy.ensure_can_approve(principal)?;
        let reviewer = principal.actor;

        let (entry, _) = commit_with_retry(&self.store, &self.config, "reject_entry", || {
            let command = JournalCommand::Reject {
                reviewer,
                reason: reason.to_string(),
                at: Utc::now(),
            };
            let (before, after, events) = self.transition(id, command)?;
            let changes = self.audited_entry_write(reviewer, &before, &after, &events)?;
            Ok((changes, after))
        })?;

        info!(entry_id = %id, "journal entry rejected");
        Ok(entry)
    }

    /// Create a Pending entry mirroring an Approved one with every side swapped.
    ///
    /// The original is left untouched; the new entry points back at it.
    #[instrument(skip(self, description))]
    pub fn reverse_entry(
        &self,
        actor: ActorId,
        id: JournalEntryId,
        date: NaiveDate,
        description: Option<String>,
    ) -> LedgerResult<JournalEntry> {
        let original = self.get_entry(id)?;
        let reversal = NewJournalEntry::reversal_of(&original, date, description)?;
        self.insert(actor, &reversal)
    }

    pub fn get_entry(&self, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.store
            .entry(id)?
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {id}")))
    }

    /// Most recent first: entry date, then creation time, then id.
    pub fn list_entries(&self, filter: &JournalFilter) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .store
            .entries()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    fn insert(&self, actor: ActorId, new: &NewJournalEntry) -> LedgerResult<JournalEntry> {
        let accounts = self.store.accounts()?;
        let id = self.store.next_entry_id()?;
        let (entry, event) = JournalEntry::create(id, new, &accounts, actor, Utc::now())?;

        let mut changes = ChangeSet::new();
        changes.record(NewEventLog::from_event(
            actor,
            &event,
            AuditEntity::JournalEntry,
            entry.id,
            None,
            Some(&entry),
        )?);
        changes.put_entry(entry.clone(), ExpectedVersion::Absent);

        match self.store.commit(changes) {
            Ok(_) => {}
            Err(StoreError::UniqueViolation(msg)) if entry.reverses.is_some() => {
                return Err(LedgerError::InvalidState(msg));
            }
            Err(e) => return Err(e.into()),
        }

        info!(entry_id = %entry.id, reverses = ?entry.reverses, "journal entry created");
        Ok(entry)
    }

    fn transition(
        &self,
        id: JournalEntryId,
        command: JournalCommand,
    ) -> LedgerResult<(JournalEntry, JournalEntry, Vec<JournalEvent>)> {
        let before = self.get_entry(id)?;
        let mut after = before.clone();
        let events = execute(&mut after, &command)?;
        Ok((before, after, events))
    }

    fn audited_entry_write(
        &self,
        actor: ActorId,
        before: &JournalEntry,
        after: &JournalEntry,
        events: &[JournalEvent],
    ) -> LedgerResult<ChangeSet> {
        let mut changes = ChangeSet::new();
        for event in events {
            changes.record(NewEventLog::from_event(
                actor,
                event,
                AuditEntity::JournalEntry,
                after.id,
                Some(before),
                Some(after),
            )?);
        }
        changes.put_entry(after.clone(), ExpectedVersion::Exact(before.version));
        Ok(changes)
    }
}
