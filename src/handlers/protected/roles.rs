// handlers/protected/roles.rs - /v2/roles

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::dataaccess::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /v2/roles
pub async fn roles_get(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.dal.role_list().await?))
}

/// GET /v2/roles/:role
pub async fn role_get(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.dal.role_get(&role).await?))
}

/// PUT /v2/roles/:role
pub async fn role_put(State(state): State<AppState>, Path(role): Path<String>) -> Result<(), ApiError> {
    state.dal.role_create(&role).await?;
    Ok(())
}

/// DELETE /v2/roles/:role
pub async fn role_delete(State(state): State<AppState>, Path(role): Path<String>) -> Result<(), ApiError> {
    state.dal.role_delete(&role).await?;
    Ok(())
}

/// PUT /v2/roles/:role/bundles/:bundle/permissions/:permission
pub async fn role_permission_put(
    State(state): State<AppState>,
    Path((role, bundle, permission)): Path<(String, String, String)>,
) -> Result<(), ApiError> {
    state
        .dal
        .role_grant_permission(&role, &bundle, &permission)
        .await?;
    Ok(())
}

/// DELETE /v2/roles/:role/bundles/:bundle/permissions/:permission
///
/// Revoking a permission the role never had succeeds.
pub async fn role_permission_delete(
    State(state): State<AppState>,
    Path((role, bundle, permission)): Path<(String, String, String)>,
) -> Result<(), ApiError> {
    state
        .dal
        .role_revoke_permission(&role, &bundle, &permission)
        .await?;
    Ok(())
}
