//! Ledger posting engine.
//!
//! Turns an approved journal entry into per-account ledger movements and the
//! updated account balances, packaged as a `ChangeSet` fragment. The engine
//! never commits on its own: the journal lifecycle merges the fragment into the
//! same commit that flips the entry to Approved, so the status change, the
//! balances, the movements and their audit records land together or not at all.
//!
//! ## Posting Flow
//!
//! ```text
//! Approved JournalEntry
//!   ↓
//! 1. Load the touched accounts (their versions become the commit guard)
//!   ↓
//! 2. Plan: apply each line's signed delta in document order
//!   ↓
//! 3. Allocate movement ids, stamp running balances
//!   ↓
//! 4. Emit account Update + movement Create audit records
//! ```
//!
//! Two approvals touching the same account race on that account's version; the
//! loser's commit fails with `Concurrency` and is re-decided by the caller.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tracing::{error, instrument};

use finken_accounting::{Account, JournalEntry, LedgerMovement, balance_as_of, plan_posting, verify_account};
use finken_core::{AccountId, ActorId, ExpectedVersion, Money};
use finken_events::{ActionType, AuditEntity, NewEventLog};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{ChangeSet, LedgerStore};

#[derive(Debug, Clone)]
pub struct PostingEngine<S> {
    store: S,
}

impl<S> PostingEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Build the ledger side of an approval.
    ///
    /// `entry` must already be in the Approved state it will be committed with.
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    pub(crate) fn post(&self, entry: &JournalEntry, actor: ActorId) -> LedgerResult<ChangeSet> {
        let mut touched: BTreeMap<AccountId, Account> = BTreeMap::new();
        for line in &entry.lines {
            if touched.contains_key(&line.account_id) {
                continue;
            }
            if let Some(account) = self.store.account(line.account_id)? {
                touched.insert(account.id, account);
            }
        }

        // Stamped after the accounts are read: a commit that wins the version
        // race on these accounts is always stamped after the one it follows.
        let at = Utc::now();
        let plan = plan_posting(entry, &touched, at)?;
        let ids = self.store.next_movement_ids(plan.movements.len())?;

        let mut changes = ChangeSet::new();
        for change in plan.accounts {
            changes.record(NewEventLog::capture(
                actor,
                at,
                ActionType::Update,
                AuditEntity::Account,
                change.after.id,
                Some(&change.before),
                Some(&change.after),
            )?);
            changes.put_account(change.after, ExpectedVersion::Exact(change.before.version));
        }

        for (planned, id) in plan.movements.into_iter().zip(ids) {
            let movement = planned.into_movement(id, entry, at);
            changes.record(NewEventLog::capture(
                actor,
                at,
                ActionType::Create,
                AuditEntity::LedgerMovement,
                movement.id,
                None,
                Some(&movement),
            )?);
            changes.append_movement(movement);
        }

        Ok(changes)
    }

    /// One account and its movements in posting order, read together.
    fn history(&self, account_id: AccountId) -> LedgerResult<(Account, Vec<LedgerMovement>)> {
        self.store
            .account_history(account_id)?
            .ok_or_else(|| LedgerError::not_found(format!("account {account_id}")))
    }

    /// Balance of an account at the end of `as_of`, folded from its movements.
    pub fn reconstruct_balance(&self, account_id: AccountId, as_of: NaiveDate) -> LedgerResult<Money> {
        let (account, movements) = self.history(account_id)?;
        Ok(balance_as_of(&account, &movements, as_of))
    }

    /// Check the stored balance and every running balance against the ledger.
    pub fn verify_account(&self, account_id: AccountId) -> LedgerResult<()> {
        let (account, movements) = self.history(account_id)?;
        verify_account(&account, &movements).map_err(|e| {
            error!(account_id = %account_id, error = %e, "ledger does not reproduce stored balance");
            LedgerError::from(e)
        })
    }
}
