//! Journal entry endpoints.
//!
//! Approve and reject carry no permission check of their own: the journal
//! service asks its approval policy, so a 403 there comes from the core.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};

use finken_accounting::NewJournalEntry;
use finken_auth::permissions::ledger;
use finken_core::JournalEntryId;

use crate::app::routes::common::{blocking, respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/:id", get(get_entry))
        .route("/:id/approve", post(approve_entry))
        .route("/:id/reject", post(reject_entry))
        .route("/:id/reverse", post(reverse_entry))
}

/// POST /journal-entries
///
/// The entry is created Pending; balances move only on approval.
pub async fn create_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewJournalEntry>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::JOURNAL_CREATE) {
        return errors::forbidden(e);
    }
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(
        StatusCode::CREATED,
        blocking(&services, move |s| s.journal.create_entry(actor, body)).await,
    )
}

/// GET /journal-entries?status&start_date&end_date&created_by
pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::JournalListQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let filter = match dto::query(query).and_then(dto::JournalListQuery::into_filter) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    respond_items(blocking(&services, move |s| s.journal.list_entries(&filter)).await)
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<JournalEntryId>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.journal.get_entry(id)).await)
}

pub async fn approve_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<JournalEntryId>, PathRejection>,
) -> axum::response::Response {
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reviewer = authz::principal_from_context(&principal);
    respond(StatusCode::OK, blocking(&services, move |s| s.journal.approve_entry(&reviewer, id)).await)
}

/// POST /journal-entries/:id/reject `{ "reason": "..." }`
pub async fn reject_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<JournalEntryId>, PathRejection>,
    payload: Result<Json<dto::RejectEntryRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reviewer = authz::principal_from_context(&principal);
    respond(
        StatusCode::OK,
        blocking(&services, move |s| s.journal.reject_entry(&reviewer, id, &body.reason)).await,
    )
}

/// POST /journal-entries/:id/reverse `{ "date": "YYYY-MM-DD", "description"? }`
pub async fn reverse_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<JournalEntryId>, PathRejection>,
    payload: Result<Json<dto::ReverseEntryRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::JOURNAL_CREATE) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(
        StatusCode::CREATED,
        blocking(&services, move |s| {
            s.journal.reverse_entry(actor, id, body.date, body.description)
        })
        .await,
    )
}
