//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger store and the services built on it
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/query DTOs and body/parameter parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use finken_infra::StoreError;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails only when the configured ledger store cannot be opened.
pub async fn build_app(config: ApiConfig) -> Result<Router, StoreError> {
    let services = Arc::new(services::open_services(config.ledger, &config.store).await?);
    Ok(router_with(services, &config.jwt_secret))
}

/// Router over already-built services.
pub fn router_with(services: Arc<services::AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(finken_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
