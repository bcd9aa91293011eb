// handlers/public/bootstrap.rs - POST /v2/bootstrap
//
// One-shot provisioning of the administrative identity on an empty
// deployment. Steps run in order and the first failure aborts; earlier steps
// are not rolled back, leaving the partial state for an operator to repair.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{info, warn};

use crate::auth::generate_random_token;
use crate::dataaccess::{Group, User};
use crate::error::{decode_json, ApiError};
use crate::state::AppState;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_GROUP: &str = "admin";
pub const ADMIN_ROLE: &str = "admin";
pub const ADMIN_PERMISSION_BUNDLE: &str = "gort";
pub const ADMIN_PERMISSIONS: [&str; 4] = [
    "manage_commands",
    "manage_groups",
    "manage_roles",
    "manage_users",
];

pub const DEFAULT_ADMIN_EMAIL: &str = "gort@localhost";
pub const DEFAULT_ADMIN_FULL_NAME: &str = "Gort Administrator";
const GENERATED_PASSWORD_LEN: usize = 32;

/// Fills in bootstrap defaults. The username is always forced to `admin`,
/// whatever the caller sent.
pub fn bootstrap_user_with_defaults(mut user: User) -> User {
    if user.email.is_empty() {
        user.email = DEFAULT_ADMIN_EMAIL.to_string();
    }

    if user.full_name.is_empty() {
        user.full_name = DEFAULT_ADMIN_FULL_NAME.to_string();
    }

    user.username = ADMIN_USER.to_string();

    if user.password.is_empty() {
        user.password = generate_random_token(GENERATED_PASSWORD_LEN);
    }

    user
}

/// Provisions the admin user, group, role and permission grants.
///
/// Rejected with 409 once any user exists. The whole check-then-act sequence
/// holds the bootstrap lock, so concurrent first calls cannot both succeed.
pub async fn bootstrap_post(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let _guard = state.bootstrap_lock.lock().await;

    let users = state.dal.user_list().await?;
    if !users.is_empty() {
        warn!("Re-bootstrap attempted");
        return Ok((StatusCode::CONFLICT, "Service already bootstrapped").into_response());
    }

    let user: User = decode_json(&body)?;
    let user = bootstrap_user_with_defaults(user);

    let dal = &state.dal;
    dal.user_create(user.clone()).await?;
    dal.group_create(Group::new(ADMIN_GROUP)).await?;
    dal.group_add_user(ADMIN_GROUP, &user.username).await?;
    dal.role_create(ADMIN_ROLE).await?;
    dal.group_grant_role(ADMIN_GROUP, ADMIN_ROLE).await?;

    for permission in ADMIN_PERMISSIONS {
        dal.role_grant_permission(ADMIN_ROLE, ADMIN_PERMISSION_BUNDLE, permission)
            .await?;
    }

    info!(user = %user.username, "Service bootstrapped");

    // The response is the only place a generated password is ever shown.
    Ok(Json(user).into_response())
}
