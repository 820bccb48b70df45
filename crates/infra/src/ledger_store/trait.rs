use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use finken_accounting::{Account, Books, JournalEntry, LedgerMovement};
use finken_core::{AccountId, ExpectedVersion, JournalEntryId, MovementId};
use finken_events::{EventLogFilter, EventLogPage, EventLogRecord, NewEventLog, Pagination};

/// An account write guarded by an optimistic version expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    pub account: Account,
    pub expected: ExpectedVersion,
}

/// A journal entry write guarded by an optimistic version expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWrite {
    pub entry: JournalEntry,
    pub expected: ExpectedVersion,
}

/// Everything one logical operation changes, committed all-or-nothing.
///
/// A change set is the unit of atomicity of the ledger: a posting's account
/// balances, its movements and the audit records describing them either all
/// become visible to readers or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub accounts: Vec<AccountWrite>,
    pub entries: Vec<EntryWrite>,
    /// Appended in order; ids are pre-allocated with `next_movement_ids`.
    pub movements: Vec<LedgerMovement>,
    /// Written in the same commit; ids are assigned by the store.
    pub audit: Vec<NewEventLog>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&mut self, account: Account, expected: ExpectedVersion) -> &mut Self {
        self.accounts.push(AccountWrite { account, expected });
        self
    }

    pub fn put_entry(&mut self, entry: JournalEntry, expected: ExpectedVersion) -> &mut Self {
        self.entries.push(EntryWrite { entry, expected });
        self
    }

    pub fn append_movement(&mut self, movement: LedgerMovement) -> &mut Self {
        self.movements.push(movement);
        self
    }

    pub fn record(&mut self, log: NewEventLog) -> &mut Self {
        self.audit.push(log);
        self
    }

    /// Fold another change set into this one (same transaction).
    pub fn merge(&mut self, other: ChangeSet) -> &mut Self {
        self.accounts.extend(other.accounts);
        self.entries.extend(other.entries);
        self.movements.extend(other.movements);
        self.audit.extend(other.audit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.entries.is_empty()
            && self.movements.is_empty()
            && self.audit.is_empty()
    }
}

/// Accounts and movements read at a single point in time.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub accounts: BTreeMap<AccountId, Account>,
    /// In append order (posting timestamp, then id).
    pub movements: Vec<LedgerMovement>,
}

impl LedgerSnapshot {
    pub fn into_books(self) -> Books {
        Books::new(self.accounts.into_values(), self.movements)
    }
}

/// Ledger store operation error.
///
/// These are **infrastructure errors** (versioning, constraints, availability)
/// as opposed to domain errors (validation, lifecycle, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Persistence boundary of the bookkeeping engine.
///
/// ## Design Principles
///
/// - **Append-only history**: movements and event-log records are never
///   updated or deleted once committed
/// - **Optimistic locking**: every account/entry write carries an
///   `ExpectedVersion`; a mismatch fails the whole commit with `Concurrency`
/// - **Atomic commits**: a `ChangeSet` is applied all-or-nothing
/// - **Snapshot reads**: `snapshot()` never observes half of a commit
///
/// ## Identifiers
///
/// Ids are handed out like database sequences: monotonically increasing,
/// never reused, with gaps allowed when an operation is retried or abandoned.
///
/// ## Constraints
///
/// Implementations must enforce, at commit time:
/// - account numbers are unique
/// - account names are unique (case-insensitive)
/// - at most one non-rejected entry reverses a given entry
pub trait LedgerStore: Send + Sync {
    fn next_account_id(&self) -> Result<AccountId, StoreError>;

    fn next_entry_id(&self) -> Result<JournalEntryId, StoreError>;

    fn next_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError>;

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// All accounts, keyed by id.
    fn accounts(&self) -> Result<BTreeMap<AccountId, Account>, StoreError>;

    fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError>;

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError>;

    /// Movements of one account in posting order.
    fn movements_for(&self, account_id: AccountId) -> Result<Vec<LedgerMovement>, StoreError>;

    /// One account and its movements in posting order, read together.
    fn account_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError>;

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError>;

    /// Filtered event log, newest first.
    fn event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError>;

    /// Apply a change set atomically; returns the committed audit records.
    fn commit(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn next_account_id(&self) -> Result<AccountId, StoreError> {
        (**self).next_account_id()
    }

    fn next_entry_id(&self) -> Result<JournalEntryId, StoreError> {
        (**self).next_entry_id()
    }

    fn next_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError> {
        (**self).next_movement_ids(count)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).account(id)
    }

    fn accounts(&self) -> Result<BTreeMap<AccountId, Account>, StoreError> {
        (**self).accounts()
    }

    fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        (**self).entry(id)
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).entries()
    }

    fn movements_for(&self, account_id: AccountId) -> Result<Vec<LedgerMovement>, StoreError> {
        (**self).movements_for(account_id)
    }

    fn account_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError> {
        (**self).account_history(account_id)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        (**self).snapshot()
    }

    fn event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError> {
        (**self).event_logs(filter, pagination)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError> {
        (**self).commit(changes)
    }
}
