use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::authz;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let resolved = authz::principal_from_context(&principal);
    Json(serde_json::json!({
        "actor": principal.actor().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": resolved.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
