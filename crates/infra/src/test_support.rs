//! Shared fixtures for the service tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use finken_accounting::{
    Account, AccountCategory, JournalEntry, JournalEntryLine, LedgerMovement, NewAccount,
    NewJournalEntry, Side,
};
use finken_auth::{PermissionPolicy, Principal, Role, permissions::ledger};
use finken_core::{AccountId, ActorId, JournalEntryId, Money, MovementId};
use finken_events::{EventLogFilter, EventLogPage, EventLogRecord, Pagination};

use crate::audit_recorder::AuditRecorder;
use crate::chart_of_accounts::ChartOfAccounts;
use crate::config::LedgerConfig;
use crate::journal_lifecycle::JournalService;
use crate::ledger_store::{ChangeSet, InMemoryLedgerStore, LedgerSnapshot, LedgerStore, StoreError};
use crate::posting_engine::PostingEngine;
use crate::statements::StatementService;

pub(crate) type Store = Arc<InMemoryLedgerStore>;

pub(crate) struct Fixture {
    pub store: Store,
    pub chart: ChartOfAccounts<Store>,
    pub journal: JournalService<Store, PermissionPolicy>,
    pub posting: PostingEngine<Store>,
    pub statements: StatementService<Store>,
    pub audit: AuditRecorder<Store>,
    pub preparer: ActorId,
    pub manager: Principal,
    pub accountant: Principal,
}

pub(crate) fn fixture() -> Fixture {
    let store: Store = Arc::new(InMemoryLedgerStore::new());
    let config = LedgerConfig::default();
    let preparer = ActorId::new();
    Fixture {
        chart: ChartOfAccounts::new(store.clone(), config),
        journal: JournalService::new(store.clone(), PermissionPolicy::default(), config),
        posting: PostingEngine::new(store.clone()),
        statements: StatementService::new(store.clone()),
        audit: AuditRecorder::new(store.clone()),
        store,
        preparer,
        manager: Principal::new(
            ActorId::new(),
            vec![Role::MANAGER],
            vec![ledger::JOURNAL_CREATE, ledger::JOURNAL_APPROVE],
        ),
        accountant: Principal::new(
            preparer,
            vec![Role::ACCOUNTANT],
            vec![ledger::JOURNAL_CREATE],
        ),
    }
}

pub(crate) fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn money(s: &str) -> Money {
    Money::parse(s).unwrap()
}

impl Fixture {
    /// Open an account on its category's natural side.
    pub fn open(&self, number: &str, name: &str, category: AccountCategory, initial: &str) -> Account {
        self.open_with(number, name, category, category.natural_side(), None, initial)
    }

    pub fn open_with(
        &self,
        number: &str,
        name: &str,
        category: AccountCategory,
        normal_side: Side,
        subcategory: Option<&str>,
        initial: &str,
    ) -> Account {
        let new = NewAccount {
            number: number.to_string(),
            name: name.to_string(),
            description: None,
            category,
            subcategory: subcategory.map(str::to_string),
            normal_side: Some(normal_side),
            initial_balance: money(initial),
            display_order: None,
            statement_type: None,
            comment: None,
        };
        self.chart.create_account(self.preparer, new).unwrap()
    }

    pub fn balance(&self, account: &Account) -> Money {
        self.chart.get_account(account.id).unwrap().balance
    }
}

pub(crate) fn line(account: &Account, side: Side, amount: &str) -> JournalEntryLine {
    JournalEntryLine {
        account_id: account.id,
        side,
        amount: money(amount),
    }
}

pub(crate) fn entry(date: NaiveDate, description: &str, lines: Vec<JournalEntryLine>) -> NewJournalEntry {
    NewJournalEntry {
        date,
        description: Some(description.to_string()),
        is_adjusting: false,
        lines,
        attachments: Vec::new(),
        reverses: None,
    }
}

/// Store wrapper whose next `n` commits fail with a chosen error.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub inner: InMemoryLedgerStore,
    fault: Mutex<Option<(u32, StoreError)>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, commits: u32, error: StoreError) {
        *self.fault.lock().unwrap() = Some((commits, error));
    }
}

impl LedgerStore for FaultyStore {
    fn next_account_id(&self) -> Result<AccountId, StoreError> {
        self.inner.next_account_id()
    }

    fn next_entry_id(&self) -> Result<JournalEntryId, StoreError> {
        self.inner.next_entry_id()
    }

    fn next_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError> {
        self.inner.next_movement_ids(count)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.account(id)
    }

    fn accounts(&self) -> Result<BTreeMap<AccountId, Account>, StoreError> {
        self.inner.accounts()
    }

    fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        self.inner.entry(id)
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.inner.entries()
    }

    fn movements_for(&self, account_id: AccountId) -> Result<Vec<LedgerMovement>, StoreError> {
        self.inner.movements_for(account_id)
    }

    fn account_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError> {
        self.inner.account_history(account_id)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        self.inner.snapshot()
    }

    fn event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError> {
        self.inner.event_logs(filter, pagination)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError> {
        let mut fault = self.fault.lock().unwrap();
        if let Some((left, error)) = fault.as_mut() {
            if *left > 0 {
                *left -= 1;
                return Err(error.clone());
            }
        }
        drop(fault);
        self.inner.commit(changes)
    }
}
