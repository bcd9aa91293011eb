// handlers/public/healthz.rs - GET /v2/healthz

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Local;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::dataaccess::User;
use crate::state::AppState;

/// Throwaway user with a unique name derived from the current time.
fn probe_user() -> User {
    let seed = format!("{}-{}", Local::now(), Uuid::new_v4());
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));

    User {
        email: "healthz@test.user".to_string(),
        full_name: "Health Check User".to_string(),
        username: format!("healthz{}", &digest[..8]),
        password: hash_password(&digest),
    }
}

/// Liveness probe that round-trips a synthetic user through the data access
/// layer.
///
/// Creation failure reports 503. Cleanup is best-effort: a failed delete is
/// logged and does not change the reported health.
///
/// The round trip holds the bootstrap lock so a concurrent bootstrap never
/// mistakes the synthetic user for an existing deployment.
pub async fn healthz_get(State(state): State<AppState>) -> Response {
    let _guard = state.bootstrap_lock.lock().await;
    let user = probe_user();

    if let Err(e) = state.dal.user_create(user.clone()).await {
        tracing::warn!(error = %e, "health check failure");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "healthy": false }))).into_response();
    }

    if let Err(e) = state.dal.user_delete(&user.username).await {
        tracing::warn!(error = %e, user = %user.username, "health check cleanup failed");
    }

    tracing::trace!("health check pass");
    Json(json!({ "healthy": true })).into_response()
}
