//! Chart of accounts endpoints.
//!
//! Reads need `accounts.read`; anything that changes an account needs
//! `accounts.manage`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use finken_accounting::{AccountPatch, NewAccount};
use finken_auth::permissions::ledger;
use finken_core::AccountId;

use crate::app::routes::common::{blocking, respond, respond_items};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", get(get_account).patch(update_account))
        .route("/:id/deactivate", post(deactivate_account))
        .route("/:id/reactivate", post(reactivate_account))
        .route("/:id/balance", get(get_balance))
        .route("/:id/ledger", get(get_ledger))
}

/// POST /accounts
pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_MANAGE) {
        return errors::forbidden(e);
    }
    let body = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(
        StatusCode::CREATED,
        blocking(&services, move |s| s.chart.create_account(actor, body)).await,
    )
}

/// GET /accounts?include_inactive=true
pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListAccountsQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    respond_items(blocking(&services, move |s| s.chart.list_accounts(query.include_inactive)).await)
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.chart.get_account(id)).await)
}

/// PATCH /accounts/:id; absent fields are left unchanged.
pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
    payload: Result<Json<AccountPatch>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_MANAGE) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let patch = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(
        StatusCode::OK,
        blocking(&services, move |s| s.chart.update_account(actor, id, patch)).await,
    )
}

pub async fn deactivate_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_MANAGE) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(StatusCode::OK, blocking(&services, move |s| s.chart.deactivate_account(actor, id)).await)
}

pub async fn reactivate_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_MANAGE) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = principal.actor();
    respond(StatusCode::OK, blocking(&services, move |s| s.chart.reactivate_account(actor, id)).await)
}

/// GET /accounts/:id/balance?as_of=YYYY-MM-DD
///
/// Without `as_of` this is the stored balance; with it the balance is folded
/// from the ledger up to and including that day.
pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
    query: Result<Query<dto::AsOfQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let as_of = query.as_of;
    match blocking(&services, move |s| s.chart.get_balance(id, as_of)).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "account_id": id,
                "as_of": query.as_of.unwrap_or_else(|| Utc::now().date_naive()),
                "balance": balance,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /accounts/:id/ledger?start_date&end_date
pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    id: Result<Path<AccountId>, PathRejection>,
    query: Result<Query<dto::LedgerQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::ACCOUNTS_READ) {
        return errors::forbidden(e);
    }
    let id = match dto::path(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let query = match dto::query(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let range = match dto::date_range(query.start_date, query.end_date) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond_items(blocking(&services, move |s| s.statements.get_ledger(id, range)).await)
}
