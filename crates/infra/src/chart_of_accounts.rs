//! Chart of accounts registry.
//!
//! Account definitions and their cached balances. Every mutation is committed
//! together with its audit record; balances only change through posting.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, instrument};

use finken_accounting::{Account, AccountCommand, AccountPatch, NewAccount};
use finken_core::{AccountId, ActorId, ExpectedVersion, Money};
use finken_events::{AuditEntity, NewEventLog, execute};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{ChangeSet, LedgerStore};
use crate::posting_engine::PostingEngine;
use crate::retry::commit_with_retry;

#[derive(Debug, Clone)]
pub struct ChartOfAccounts<S> {
    store: S,
    posting: PostingEngine<S>,
    config: LedgerConfig,
}

impl<S> ChartOfAccounts<S>
where
    S: LedgerStore + Clone,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            posting: PostingEngine::new(store.clone()),
            store,
            config,
        }
    }

    #[instrument(skip(self, new), fields(number = %new.number))]
    pub fn create_account(&self, actor: ActorId, new: NewAccount) -> LedgerResult<Account> {
        let id = self.store.next_account_id()?;
        let (account, event) = Account::open(id, &new, actor, Utc::now())?;

        let mut changes = ChangeSet::new();
        changes.record(NewEventLog::from_event(
            actor,
            &event,
            AuditEntity::Account,
            account.id,
            None,
            Some(&account),
        )?);
        changes.put_account(account.clone(), ExpectedVersion::Absent);
        self.store.commit(changes)?;

        info!(account_id = %account.id, "account created");
        Ok(account)
    }

    #[instrument(skip(self, patch))]
    pub fn update_account(
        &self,
        actor: ActorId,
        id: AccountId,
        patch: AccountPatch,
    ) -> LedgerResult<Account> {
        self.mutate(actor, id, "update_account", |at| AccountCommand::Update {
            patch: patch.clone(),
            at,
        })
    }

    /// Fails with `Conflict` while the balance is non-zero.
    #[instrument(skip(self))]
    pub fn deactivate_account(&self, actor: ActorId, id: AccountId) -> LedgerResult<Account> {
        self.mutate(actor, id, "deactivate_account", |at| AccountCommand::Deactivate { at })
    }

    #[instrument(skip(self))]
    pub fn reactivate_account(&self, actor: ActorId, id: AccountId) -> LedgerResult<Account> {
        self.mutate(actor, id, "reactivate_account", |at| AccountCommand::Reactivate { at })
    }

    pub fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.store
            .account(id)?
            .ok_or_else(|| LedgerError::not_found(format!("account {id}")))
    }

    /// Accounts ordered by display order, then account number.
    pub fn list_accounts(&self, include_inactive: bool) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .store
            .accounts()?
            .into_values()
            .filter(|a| include_inactive || a.is_active)
            .collect();
        accounts.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(accounts)
    }

    /// Stored balance, or a point-in-time reconstruction when `as_of` is given.
    pub fn get_balance(&self, id: AccountId, as_of: Option<NaiveDate>) -> LedgerResult<Money> {
        match as_of {
            None => Ok(self.get_account(id)?.balance),
            Some(day) => self.posting.reconstruct_balance(id, day),
        }
    }

    fn mutate(
        &self,
        actor: ActorId,
        id: AccountId,
        operation: &'static str,
        command: impl Fn(DateTime<Utc>) -> AccountCommand,
    ) -> LedgerResult<Account> {
        let (account, _) = commit_with_retry(&self.store, &self.config, operation, || {
            let before = self.get_account(id)?;
            let mut after = before.clone();
            let events = execute(&mut after, &command(Utc::now()))?;

            let mut changes = ChangeSet::new();
            for event in &events {
                changes.record(NewEventLog::from_event(
                    actor,
                    event,
                    AuditEntity::Account,
                    id,
                    Some(&before),
                    Some(&after),
                )?);
            }
            changes.put_account(after.clone(), ExpectedVersion::Exact(before.version));
            Ok((changes, after))
        })?;

        info!(account_id = %id, operation, version = account.version, "account changed");
        Ok(account)
    }
}
