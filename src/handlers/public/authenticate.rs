// handlers/public/authenticate.rs - POST /v2/authenticate

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info};

use crate::dataaccess::User;
use crate::error::{decode_json, ApiError};
use crate::state::AppState;
use crate::telemetry;

/// Lifetime of a freshly issued session token.
pub const SESSION_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Exchanges `{username, password}` for a session token.
///
/// This route runs before any identity exists, so an unknown user is answered
/// with an explicit 400 rather than the generic not-found mapping, and bad
/// credentials get a bare 403.
pub async fn authenticate_post(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let credentials: User = decode_json(&body)?;
    let username = credentials.username.as_str();

    let exists = state.dal.user_exists(username).await.map_err(|e| {
        error!(user = %username, error = %e, "Authentication: failed to find user");
        telemetry::record_error("authentication_lookup");
        ApiError::from(e)
    })?;

    if !exists {
        error!(user = %username, "Authentication: no such user");
        telemetry::record_error("authentication_no_such_user");
        return Ok((StatusCode::BAD_REQUEST, "No such user").into_response());
    }

    let authenticated = state
        .dal
        .user_authenticate(username, &credentials.password)
        .await?;

    if !authenticated {
        info!(user = %username, "Authentication: bad credentials");
        return Ok((StatusCode::FORBIDDEN, "Forbidden").into_response());
    }

    let token = state.dal.token_generate(username, SESSION_TOKEN_TTL).await?;

    Ok(Json(token).into_response())
}
