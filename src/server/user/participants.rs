use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};

use super::access::{is_group_owner, require_group_admin};

pub async fn list_participants(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    let participants = store
        .list_group_participants(&id)
        .api_err("Failed to list participants")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(participants)))
}

/// Self-removal. The owner can never leave their own group; their admin row
/// (if any), their tasks and those tasks' notes go with them.
pub async fn leave_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    if is_group_owner(&group, &auth.user.id) {
        return Err(ApiError::forbidden("The group owner cannot leave"));
    }

    let participant = store
        .find_participant(&auth.user.id, &id)
        .api_err("Failed to check membership")?
        .or_not_found("Not a participant of this group")?;

    store
        .remove_participant(&participant)
        .api_err("Failed to leave group")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "left": true
    }))))
}

/// Admin-initiated removal. The owner is untouchable, and only the owner
/// may remove a participant who holds admin rights.
pub async fn kick_participant(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, participant_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    require_group_admin(store, &auth.user.id, &id)?;

    let target = store
        .get_participant(&participant_id)
        .api_err("Failed to get participant")?
        .filter(|p| p.group_id == id)
        .or_not_found("Participant not found")?;

    if is_group_owner(&group, &target.user_id) {
        return Err(ApiError::forbidden("The group owner cannot be removed"));
    }

    let target_is_admin = store
        .find_admin(&target.id, &id)
        .api_err("Failed to check admin status")?
        .is_some();

    if target_is_admin && !is_group_owner(&group, &auth.user.id) {
        return Err(ApiError::forbidden(
            "Only the owner can remove another admin",
        ));
    }

    store
        .remove_participant(&target)
        .api_err("Failed to remove participant")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "removed": true
    }))))
}
