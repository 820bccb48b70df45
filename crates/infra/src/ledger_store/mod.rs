//! Persistence boundary for the ledger.
//!
//! This module defines an infrastructure-facing abstraction for storing
//! accounts, journal entries, ledger movements and audit records without
//! making any storage assumptions. Services in this crate only talk to
//! `LedgerStore`. The in-memory implementation backs tests and development;
//! the Postgres implementation backs deployed servers.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

use tracing::info;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{AccountWrite, ChangeSet, EntryWrite, LedgerSnapshot, LedgerStore, StoreError};

use crate::config::StoreConfig;

/// Open the store selected by configuration.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match config {
        StoreConfig::InMemory => {
            info!("ledger store: in-memory");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresLedgerStore::connect(database_url, *max_connections).await?;
            info!(max_connections, "ledger store: postgres");
            Ok(Arc::new(store))
        }
    }
}
