//! Audit trail inspection endpoints.
//!
//! Read-only. Results are newest first and paginated (`limit` defaults to 100
//! and is capped at 1000).

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};

use finken_auth::permissions::ledger;
use finken_events::AuditEntity;

use crate::app::routes::common::{blocking, respond};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/account-events", get(account_events))
        .route("/journal-events", get(journal_events))
}

/// GET /event-logs?entity&record_id&actor&action&since&until&limit&offset
pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::EventLogQuery>, QueryRejection>,
) -> axum::response::Response {
    entity_events(services, principal, query, None).await
}

pub async fn account_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::EventLogQuery>, QueryRejection>,
) -> axum::response::Response {
    entity_events(services, principal, query, Some(AuditEntity::Account)).await
}

pub async fn journal_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::EventLogQuery>, QueryRejection>,
) -> axum::response::Response {
    entity_events(services, principal, query, Some(AuditEntity::JournalEntry)).await
}

async fn entity_events(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    query: Result<Query<dto::EventLogQuery>, QueryRejection>,
    fixed: Option<AuditEntity>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::AUDIT_READ) {
        return errors::forbidden(e);
    }
    let (filter, pagination) = match dto::query(query).and_then(dto::EventLogQuery::into_parts) {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    let result = blocking(&services, move |s| match fixed {
        Some(AuditEntity::Account) => s.audit.account_events(filter, pagination),
        Some(AuditEntity::JournalEntry) => s.audit.journal_events(filter, pagination),
        _ => s.audit.query_events(&filter, pagination),
    })
    .await;
    respond(StatusCode::OK, result)
}
