use std::sync::Arc;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use finken_infra::{LedgerError, LedgerResult};

use crate::app::errors;
use crate::app::services::AppServices;

/// Run a ledger call on the blocking pool.
///
/// Services are synchronous and stores may hold locks or wait on the
/// database, so they never run on the async worker threads.
pub async fn blocking<T, F>(services: &Arc<AppServices>, call: F) -> LedgerResult<T>
where
    F: FnOnce(&AppServices) -> LedgerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let services = Arc::clone(services);
    tokio::task::spawn_blocking(move || call(&services))
        .await
        .unwrap_or_else(|e| Err(LedgerError::Consistency(format!("ledger task failed: {e}"))))
}

/// Serialize a service result, or map its error to the standard error body.
pub fn respond<T: Serialize>(status: StatusCode, result: LedgerResult<T>) -> axum::response::Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Collections are wrapped as `{ "items": [...] }`.
pub fn respond_items<T: Serialize>(result: LedgerResult<Vec<T>>) -> axum::response::Response {
    match result {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
