//! Financial statements. All require `reports.read`.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};

use finken_auth::permissions::ledger;

use crate::app::routes::common::{blocking, respond};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/trial-balance", get(trial_balance))
        .route("/income-statement", get(income_statement))
        .route("/balance-sheet", get(balance_sheet))
        .route("/retained-earnings", get(retained_earnings))
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::AsOfQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::REPORTS_READ) {
        return errors::forbidden(e);
    }
    let as_of = match dto::query(query) {
        Ok(q) => q.date_or_today(),
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.statements.trial_balance(as_of)).await)
}

pub async fn income_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::PeriodQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::REPORTS_READ) {
        return errors::forbidden(e);
    }
    let period = match dto::query(query).and_then(|q| dto::date_range(q.start, q.end)) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.statements.income_statement(period)).await)
}

pub async fn balance_sheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::AsOfQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::REPORTS_READ) {
        return errors::forbidden(e);
    }
    let as_of = match dto::query(query) {
        Ok(q) => q.date_or_today(),
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.statements.balance_sheet(as_of)).await)
}

pub async fn retained_earnings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::PeriodQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::authorize_request(&principal, &ledger::REPORTS_READ) {
        return errors::forbidden(e);
    }
    let period = match dto::query(query).and_then(|q| dto::date_range(q.start, q.end)) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, blocking(&services, move |s| s.statements.retained_earnings(period)).await)
}
