//! Service wiring for the HTTP layer.
//!
//! One ledger store per process, chosen by `StoreConfig`; every service shares
//! it through an `Arc`. Approval rights come from the `journal.approve`
//! permission.

use std::sync::Arc;

use finken_auth::PermissionPolicy;
use finken_infra::{
    AuditRecorder, ChartOfAccounts, JournalService, LedgerConfig, LedgerStore, StatementService,
    StoreConfig, StoreError,
};

pub type Store = Arc<dyn LedgerStore>;

pub struct AppServices {
    pub chart: ChartOfAccounts<Store>,
    pub journal: JournalService<Store, PermissionPolicy>,
    pub statements: StatementService<Store>,
    pub audit: AuditRecorder<Store>,
}

pub fn build_services(config: LedgerConfig, store: Store) -> AppServices {
    AppServices {
        chart: ChartOfAccounts::new(store.clone(), config),
        journal: JournalService::new(store.clone(), PermissionPolicy::default(), config),
        statements: StatementService::new(store.clone()),
        audit: AuditRecorder::new(store),
    }
}

/// Open the configured store and build the services on top of it.
pub async fn open_services(config: LedgerConfig, store: &StoreConfig) -> Result<AppServices, StoreError> {
    let store = finken_infra::open_store(store).await?;
    tracing::info!(commit_retries = config.commit_retries, "ledger services ready");
    Ok(build_services(config, store))
}
