//! Infrastructure layer: persistence boundary, ledger services, config.
//!
//! The services here wire the pure accounting domain to a `LedgerStore`:
//! they load state, let the domain decide, and commit the outcome together
//! with its audit trail.

pub mod audit_recorder;
pub mod chart_of_accounts;
pub mod config;
pub mod error;
pub mod journal_lifecycle;
pub mod ledger_store;
pub mod posting_engine;
pub mod statements;

mod retry;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

pub use audit_recorder::AuditRecorder;
pub use chart_of_accounts::ChartOfAccounts;
pub use config::{ConfigError, LedgerConfig, StoreConfig};
pub use error::{LedgerError, LedgerResult};
pub use journal_lifecycle::{JournalFilter, JournalService};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError, open_store};
pub use posting_engine::PostingEngine;
pub use statements::StatementService;
