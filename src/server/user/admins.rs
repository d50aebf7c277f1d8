use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::PromoteAdminRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::Admin;

use super::access::{is_group_owner, require_group_admin};

/// Grants admin rights to a participant. The grant references the
/// participant id, not the user id.
pub async fn promote_admin(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PromoteAdminRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    let participant = store
        .get_participant(&req.participant_id)
        .api_err("Failed to get participant")?
        .filter(|p| p.group_id == group.id)
        .or_not_found("Participant not found")?;

    require_group_admin(store, &auth.user.id, &id)?;

    if store
        .find_admin(&participant.id, &id)
        .api_err("Failed to check admin status")?
        .is_some()
    {
        return Err(ApiError::conflict(
            "Participant is already an admin of this group",
        ));
    }

    let admin = Admin {
        id: Uuid::new_v4().to_string(),
        participant_id: participant.id,
        group_id: group.id,
        created_at: Utc::now(),
    };

    store.create_admin(&admin).api_err("Failed to grant admin")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(admin))))
}

/// Revokes a participant's admin rights. Admins may step down themselves;
/// demoting anyone else is reserved for the owner.
pub async fn demote_admin(
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

    let admin = store
        .find_admin(&participant_id, &id)
        .api_err("Failed to check admin status")?
        .or_not_found("Participant is not an admin of this group")?;

    let caller_participant = store
        .find_participant(&auth.user.id, &id)
        .api_err("Failed to check membership")?;

    let self_demotion = caller_participant
        .as_ref()
        .is_some_and(|p| p.id == participant_id);

    if !self_demotion && !is_group_owner(&group, &auth.user.id) {
        return Err(ApiError::forbidden(
            "Only the owner can demote another admin",
        ));
    }

    store
        .delete_admin(&admin.id)
        .api_err("Failed to revoke admin")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "demoted": true
    }))))
}
