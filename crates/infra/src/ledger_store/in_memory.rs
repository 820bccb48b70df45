use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use finken_accounting::{Account, EntryStatus, JournalEntry, LedgerMovement};
use finken_core::{AccountId, EventLogId, JournalEntryId, MovementId};
use finken_events::{EventLogFilter, EventLogPage, EventLogRecord, Pagination};

use super::r#trait::{ChangeSet, LedgerSnapshot, LedgerStore, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    movements: Vec<LedgerMovement>,
    /// Positions in `movements`, per account, in append order.
    movements_by_account: HashMap<AccountId, Vec<usize>>,
    movement_ids: HashSet<MovementId>,
    event_logs: Vec<EventLogRecord>,
    last_event_log_id: i64,
}

impl LedgerState {
    fn movements_of(&self, account_id: AccountId) -> Vec<LedgerMovement> {
        let mut out: Vec<LedgerMovement> = self
            .movements_by_account
            .get(&account_id)
            .map(|positions| positions.iter().map(|&i| self.movements[i].clone()).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then(a.id.cmp(&b.id)));
        out
    }
}

/// Records written by one commit, layered over the committed state.
///
/// Only the touched records are held here; everything else is read through
/// from `LedgerState`, so staging costs nothing for untouched rows.
struct Overlay<'a, K, V> {
    committed: &'a BTreeMap<K, V>,
    staged: BTreeMap<K, &'a V>,
}

impl<'a, K: Ord + Copy, V> Overlay<'a, K, V> {
    fn new(committed: &'a BTreeMap<K, V>) -> Self {
        Self {
            committed,
            staged: BTreeMap::new(),
        }
    }

    fn get(&self, key: &K) -> Option<&'a V> {
        self.staged
            .get(key)
            .copied()
            .or_else(|| self.committed.get(key))
    }

    fn stage(&mut self, key: K, value: &'a V) {
        self.staged.insert(key, value);
    }

    /// Every record as it would read after the commit.
    fn values(&self) -> impl Iterator<Item = &'a V> + '_ {
        self.committed
            .iter()
            .filter(|(k, _)| !self.staged.contains_key(*k))
            .map(|(_, v)| v)
            .chain(self.staged.values().copied())
    }
}

/// In-memory ledger store.
///
/// One `RwLock` guards the whole ledger, so a commit is a single critical
/// section and every read sees either all of a commit or none of it.
/// Intended for tests/dev and for the single-process server.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    movement_seq: AtomicI64,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// Key under which account names must be unique.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn is_live_reversal(entry: &JournalEntry) -> bool {
    entry.reverses.is_some() && entry.status != EntryStatus::Rejected
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_account_constraints(
        accounts: &Overlay<'_, AccountId, Account>,
        written: &Account,
    ) -> Result<(), StoreError> {
        let name = name_key(&written.name);
        for other in accounts.values().filter(|a| a.id != written.id) {
            if other.number == written.number {
                return Err(StoreError::UniqueViolation(format!(
                    "account number '{}' is already used by account {}",
                    written.number, other.id
                )));
            }
            if name_key(&other.name) == name {
                return Err(StoreError::UniqueViolation(format!(
                    "account name '{}' is already used by account {}",
                    written.name, other.id
                )));
            }
        }
        Ok(())
    }

    fn check_entry_constraints(
        entries: &Overlay<'_, JournalEntryId, JournalEntry>,
        written: &JournalEntry,
    ) -> Result<(), StoreError> {
        let Some(original) = written.reverses else {
            return Ok(());
        };
        if !is_live_reversal(written) {
            return Ok(());
        }
        let clash = entries
            .values()
            .find(|e| e.id != written.id && e.reverses == Some(original) && is_live_reversal(e));
        match clash {
            Some(other) => Err(StoreError::UniqueViolation(format!(
                "entry {original} is already reversed by entry {}",
                other.id
            ))),
            None => Ok(()),
        }
    }

    /// Validate a change set against the committed state without mutating it.
    fn check(state: &LedgerState, changes: &ChangeSet) -> Result<HashSet<MovementId>, StoreError> {
        let mut accounts = Overlay::new(&state.accounts);
        for write in &changes.accounts {
            let current = accounts.get(&write.account.id).map(|a| a.version);
            if !write.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "account {}: expected {:?}, found {current:?}",
                    write.account.id, write.expected
                )));
            }
            accounts.stage(write.account.id, &write.account);
        }
        for write in &changes.accounts {
            Self::check_account_constraints(&accounts, &write.account)?;
        }

        let mut entries = Overlay::new(&state.entries);
        for write in &changes.entries {
            let current = entries.get(&write.entry.id).map(|e| e.version);
            if !write.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "journal entry {}: expected {:?}, found {current:?}",
                    write.entry.id, write.expected
                )));
            }
            entries.stage(write.entry.id, &write.entry);
        }
        for write in &changes.entries {
            Self::check_entry_constraints(&entries, &write.entry)?;
        }

        let mut batch_ids = HashSet::with_capacity(changes.movements.len());
        for m in &changes.movements {
            if state.movement_ids.contains(&m.id) || !batch_ids.insert(m.id) {
                return Err(StoreError::UniqueViolation(format!(
                    "ledger movement {} already exists",
                    m.id
                )));
            }
            if accounts.get(&m.account_id).is_none() {
                return Err(StoreError::Corrupt(format!(
                    "ledger movement {} references missing account {}",
                    m.id, m.account_id
                )));
            }
            if entries.get(&m.entry_id).is_none() {
                return Err(StoreError::Corrupt(format!(
                    "ledger movement {} references missing journal entry {}",
                    m.id, m.entry_id
                )));
            }
        }
        Ok(batch_ids)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn next_account_id(&self) -> Result<AccountId, StoreError> {
        Ok(AccountId::new(self.account_seq.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn next_entry_id(&self) -> Result<JournalEntryId, StoreError> {
        Ok(JournalEntryId::new(self.entry_seq.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn next_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError> {
        let count = i64::try_from(count)
            .map_err(|_| StoreError::Unavailable(format!("cannot allocate {count} movement ids")))?;
        let first = self.movement_seq.fetch_add(count, Ordering::SeqCst) + 1;
        Ok((first..first + count).map(MovementId::new).collect())
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.accounts.get(&id).cloned())
    }

    fn accounts(&self) -> Result<BTreeMap<AccountId, Account>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.accounts.clone())
    }

    fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.entries.get(&id).cloned())
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.entries.values().cloned().collect())
    }

    fn movements_for(&self, account_id: AccountId) -> Result<Vec<LedgerMovement>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.movements_of(account_id))
    }

    fn account_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .accounts
            .get(&account_id)
            .map(|account| (account.clone(), state.movements_of(account_id))))
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(LedgerSnapshot {
            accounts: state.accounts.clone(),
            movements: state.movements.clone(),
        })
    }

    fn event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(EventLogPage::collect(&state.event_logs, filter, pagination))
    }

    fn commit(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError> {
        if changes.is_empty() {
            return Ok(vec![]);
        }

        let mut state = self.state.write().map_err(poisoned)?;
        let batch_ids = Self::check(&state, &changes)?;

        for write in changes.accounts {
            state.accounts.insert(write.account.id, write.account);
        }
        for write in changes.entries {
            state.entries.insert(write.entry.id, write.entry);
        }
        state.movement_ids.extend(batch_ids);
        for m in changes.movements {
            let position = state.movements.len();
            state.movements_by_account.entry(m.account_id).or_default().push(position);
            state.movements.push(m);
        }

        let mut committed = Vec::with_capacity(changes.audit.len());
        for log in changes.audit {
            state.last_event_log_id += 1;
            let record = EventLogRecord::from_new(EventLogId::new(state.last_event_log_id), log);
            state.event_logs.push(record.clone());
            committed.push(record);
        }

        Ok(committed)
    }
}
