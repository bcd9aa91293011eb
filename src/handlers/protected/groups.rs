// handlers/protected/groups.rs - /v2/groups

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::dataaccess::Group;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /v2/groups
pub async fn groups_get(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.dal.group_list().await?))
}

/// GET /v2/groups/:group
pub async fn group_get(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(state.dal.group_get(&group).await?))
}

/// PUT /v2/groups/:group
pub async fn group_put(State(state): State<AppState>, Path(group): Path<String>) -> Result<(), ApiError> {
    state.dal.group_create(Group::new(group)).await?;
    Ok(())
}

/// DELETE /v2/groups/:group
pub async fn group_delete(State(state): State<AppState>, Path(group): Path<String>) -> Result<(), ApiError> {
    state.dal.group_delete(&group).await?;
    Ok(())
}

/// PUT /v2/groups/:group/members/:username
pub async fn group_member_put(
    State(state): State<AppState>,
    Path((group, username)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.dal.group_add_user(&group, &username).await?;
    Ok(())
}

/// DELETE /v2/groups/:group/members/:username
pub async fn group_member_delete(
    State(state): State<AppState>,
    Path((group, username)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.dal.group_remove_user(&group, &username).await?;
    Ok(())
}

/// PUT /v2/groups/:group/roles/:role
pub async fn group_role_put(
    State(state): State<AppState>,
    Path((group, role)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.dal.group_grant_role(&group, &role).await?;
    Ok(())
}

/// DELETE /v2/groups/:group/roles/:role
pub async fn group_role_delete(
    State(state): State<AppState>,
    Path((group, role)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.dal.group_revoke_role(&group, &role).await?;
    Ok(())
}
