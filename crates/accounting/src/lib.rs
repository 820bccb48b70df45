//! Accounting module (double-entry bookkeeping).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod journal;
pub mod posting;
pub mod statements;

pub use account::{
    Account, AccountCategory, AccountCommand, AccountEvent, AccountPatch, NewAccount, Side,
    StatementType, signed_delta,
};
pub use journal::{
    AttachmentRef, EntryStatus, JournalCommand, JournalEntry, JournalEntryLine, JournalEvent,
    LineTotals, NewAttachment, NewJournalEntry, validate_lines,
};
pub use posting::{
    AccountChange, LedgerMovement, PlannedMovement, PostingPlan, balance_as_of, fold_balance,
    plan_posting, verify_account,
};
pub use statements::{
    BalanceSheet, Books, IncomeStatement, RetainedEarningsStatement, StatementLine, TrialBalance,
    TrialBalanceRow,
};
