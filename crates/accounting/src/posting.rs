//! Turning an approved entry into ledger movements.
//!
//! Planning is pure: it works on copies of the touched accounts and returns the
//! new account states plus one movement per line. The caller commits the plan
//! atomically (accounts at their expected versions, movements appended).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use finken_core::{AccountId, DomainError, DomainResult, JournalEntryId, Money, MovementId};
use finken_events::execute;

use crate::account::{Account, AccountCommand, AccountEvent, Side, signed_delta};
use crate::journal::{EntryStatus, JournalEntry};

/// A posted, append-only ledger record. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMovement {
    pub id: MovementId,
    pub account_id: AccountId,
    /// Post reference: the originating journal entry.
    pub entry_id: JournalEntryId,
    /// Transaction date (the entry date).
    pub date: NaiveDate,
    pub description: Option<String>,
    pub debit: Money,
    pub credit: Money,
    /// Account balance immediately after this movement was applied.
    pub balance: Money,
    pub posted_at: DateTime<Utc>,
}

impl LedgerMovement {
    pub fn side(&self) -> Side {
        if self.debit.is_zero() { Side::Credit } else { Side::Debit }
    }

    pub fn amount(&self) -> Money {
        self.debit + self.credit
    }

    /// Change this movement made to a balance kept on `normal_side`.
    pub fn signed_delta(&self, normal_side: Side) -> Money {
        signed_delta(normal_side, self.side(), self.amount())
    }
}

/// A movement waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMovement {
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Money,
    pub balance: Money,
}

impl PlannedMovement {
    pub fn into_movement(self, id: MovementId, entry: &JournalEntry, posted_at: DateTime<Utc>) -> LedgerMovement {
        let (debit, credit) = match self.side {
            Side::Debit => (self.amount, Money::ZERO),
            Side::Credit => (Money::ZERO, self.amount),
        };
        LedgerMovement {
            id,
            account_id: self.account_id,
            entry_id: entry.id,
            date: entry.date,
            description: entry.description.clone(),
            debit,
            credit,
            balance: self.balance,
            posted_at,
        }
    }
}

/// Account state before and after posting, plus the events that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChange {
    pub before: Account,
    pub after: Account,
    pub events: Vec<AccountEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPlan {
    pub entry_id: JournalEntryId,
    /// Touched accounts, ordered by id.
    pub accounts: Vec<AccountChange>,
    /// One per line, in document order.
    pub movements: Vec<PlannedMovement>,
}

impl PostingPlan {
    /// Net debit-positive change across all touched accounts.
    pub fn net_debit_delta(&self) -> Money {
        self.movements
            .iter()
            .map(|m| signed_delta(Side::Debit, m.side, m.amount))
            .sum()
    }
}

/// Plan the posting of an approved entry.
///
/// Lines are applied in document order; an account touched twice sees the
/// second line on top of the first. Fails with `Conflict` if an account became
/// inactive since the entry was created, and with `Consistency` if the entry's
/// net effect is not zero or references an account that no longer exists.
pub fn plan_posting(
    entry: &JournalEntry,
    accounts: &BTreeMap<AccountId, Account>,
    at: DateTime<Utc>,
) -> DomainResult<PostingPlan> {
    if entry.status != EntryStatus::Approved {
        return Err(DomainError::invalid_state(format!(
            "journal entry {} is {} and cannot be posted",
            entry.id,
            entry.status.as_str()
        )));
    }
    entry.ensure_balanced()?;

    let mut working: BTreeMap<AccountId, AccountChange> = BTreeMap::new();
    let mut movements = Vec::with_capacity(entry.lines.len());

    for line in &entry.lines {
        if !working.contains_key(&line.account_id) {
            let acct = accounts.get(&line.account_id).ok_or_else(|| {
                DomainError::consistency(format!(
                    "journal entry {} references missing account {}",
                    entry.id, line.account_id
                ))
            })?;
            working.insert(
                line.account_id,
                AccountChange {
                    before: acct.clone(),
                    after: acct.clone(),
                    events: Vec::new(),
                },
            );
        }
        let Some(change) = working.get_mut(&line.account_id) else {
            continue;
        };

        let delta = signed_delta(change.after.normal_side, line.side, line.amount);
        let events = execute(
            &mut change.after,
            &AccountCommand::Post {
                entry_id: entry.id,
                delta,
                at,
            },
        )?;
        change.events.extend(events);

        movements.push(PlannedMovement {
            account_id: line.account_id,
            side: line.side,
            amount: line.amount,
            balance: change.after.balance,
        });
    }

    let plan = PostingPlan {
        entry_id: entry.id,
        accounts: working.into_values().collect(),
        movements,
    };

    let net = plan.net_debit_delta();
    if !net.is_zero() {
        return Err(DomainError::consistency(format!(
            "posting entry {} would change the books by {net}",
            entry.id
        )));
    }
    Ok(plan)
}

/// Fold movements (already in posting order) onto an opening balance.
pub fn fold_balance<'a>(
    initial: Money,
    normal_side: Side,
    movements: impl IntoIterator<Item = &'a LedgerMovement>,
) -> Money {
    movements
        .into_iter()
        .fold(initial, |bal, m| bal + m.signed_delta(normal_side))
}

/// Balance of `account` counting only movements dated on or before `as_of`.
pub fn balance_as_of<'a>(
    account: &Account,
    movements: impl IntoIterator<Item = &'a LedgerMovement>,
    as_of: NaiveDate,
) -> Money {
    fold_balance(
        account.initial_balance,
        account.normal_side,
        movements.into_iter().filter(|m| m.date <= as_of),
    )
}

/// Check that stored running balances and the cached account balance agree
/// with a fold of the account's movements.
pub fn verify_account(account: &Account, movements: &[LedgerMovement]) -> DomainResult<()> {
    let mut running = account.initial_balance;
    for m in movements {
        if m.account_id != account.id {
            return Err(DomainError::consistency(format!(
                "movement {} belongs to account {}, not {}",
                m.id, m.account_id, account.id
            )));
        }
        running += m.signed_delta(account.normal_side);
        if running != m.balance {
            return Err(DomainError::consistency(format!(
                "movement {} on account {} records balance {} but the ledger folds to {}",
                m.id, account.number, m.balance, running
            )));
        }
    }
    if running != account.balance {
        return Err(DomainError::consistency(format!(
            "account {} stores balance {} but its ledger folds to {}",
            account.number, account.balance, running
        )));
    }
    Ok(())
}
