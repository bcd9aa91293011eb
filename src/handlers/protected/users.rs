// handlers/protected/users.rs - /v2/users

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Json,
};

use crate::dataaccess::User;
use crate::error::{decode_json, ApiError};
use crate::state::AppState;

/// GET /v2/users
pub async fn users_get(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.dal.user_list().await?))
}

/// GET /v2/users/:username
pub async fn user_get(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.dal.user_get(&username).await?))
}

/// PUT /v2/users/:username
///
/// Creates the user, or updates the non-empty fields of an existing one.
/// The path always names the user; a username in the body is ignored. New
/// users must come with a password.
pub async fn user_put(
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<(), ApiError> {
    let mut user: User = if body.is_empty() {
        User::default()
    } else {
        decode_json(&body)?
    };
    user.username = username;

    if state.dal.user_exists(&user.username).await? {
        state.dal.user_update(user).await?;
        return Ok(());
    }

    if user.password.is_empty() {
        return Err(ApiError::MissingValue("password"));
    }

    state.dal.user_create(user).await?;
    Ok(())
}

/// DELETE /v2/users/:username
pub async fn user_delete(State(state): State<AppState>, Path(username): Path<String>) -> Result<(), ApiError> {
    state.dal.user_delete(&username).await?;
    Ok(())
}
