use axum::{Router, routing::get};

pub mod accounts;
pub mod common;
pub mod event_logs;
pub mod journal;
pub mod reports;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounts", accounts::router())
        .nest("/journal-entries", journal::router())
        .nest("/reports", reports::router())
        .nest("/event-logs", event_logs::router())
}
