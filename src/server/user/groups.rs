use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateGroupRequest, GroupDetailResponse, JoinGroupRequest, UpdateGroupRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{JOIN_CODE_LEN, validate_group_title, validate_join_code};
use crate::types::{Group, Participant};

use super::access::{is_group_admin, is_group_participant, require_group_admin};

const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const JOIN_CODE_RETRIES: u32 = 3;

fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

pub async fn create_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    validate_group_title(&req.title)?;

    let store = state.store.as_ref();
    let now = Utc::now();

    // Codes collide within the unique index; retry with a fresh one.
    for _ in 0..JOIN_CODE_RETRIES {
        let group = Group {
            id: Uuid::new_v4().to_string(),
            title: req.title.clone(),
            code: generate_join_code(),
            owner_id: auth.user.id.clone(),
            created_at: now,
        };

        let owner = Participant {
            id: Uuid::new_v4().to_string(),
            user_id: auth.user.id.clone(),
            group_id: group.id.clone(),
            created_at: now,
        };

        match store.create_group(&group, &owner) {
            Ok(()) => {
                return Ok::<_, ApiError>((
                    StatusCode::CREATED,
                    Json(ApiResponse::success(group)),
                ));
            }
            Err(crate::error::Error::JoinCodeCollision) => continue,
            Err(_) => return Err(ApiError::internal("Failed to create group")),
        }
    }

    Err(ApiError::internal("Failed to create group after retries"))
}

/// Union of groups the caller owns and groups they participate in.
pub async fn list_groups(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let groups = state
        .store
        .list_user_groups(&auth.user.id)
        .api_err("Failed to list groups")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(groups)))
}

pub async fn get_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    if !is_group_participant(store, &auth.user.id, &id).api_err("Failed to check membership")? {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    let is_admin = is_group_admin(store, &auth.user.id, &id)
        .api_err("Failed to check admin status")?
        .unwrap_or(false);

    Ok::<_, ApiError>(Json(ApiResponse::success(GroupDetailResponse {
        group,
        is_admin,
    })))
}

pub async fn update_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> impl IntoResponse {
    validate_group_title(&req.title)?;

    let store = state.store.as_ref();

    require_group_admin(store, &auth.user.id, &id)?;

    store
        .update_group_title(&id, &req.title)
        .api_err("Failed to rename group")?;

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

/// Deletes the group and everything under it: notes of its tasks, tasks,
/// admin rows, participants, then the group itself.
pub async fn delete_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    require_group_admin(store, &auth.user.id, &id)?;

    store.delete_group(&id).api_err("Failed to delete group")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "deleted": true
    }))))
}

pub async fn join_group(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinGroupRequest>,
) -> impl IntoResponse {
    let code = req.code.trim().to_ascii_uppercase();
    validate_join_code(&code)?;

    let store = state.store.as_ref();

    let group = store
        .get_group_by_code(&code)
        .api_err("Failed to look up join code")?
        .or_not_found("Group not found")?;

    if is_group_participant(store, &auth.user.id, &group.id)
        .api_err("Failed to check membership")?
    {
        return Err(ApiError::conflict("Already a participant of this group"));
    }

    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        user_id: auth.user.id.clone(),
        group_id: group.id.clone(),
        created_at: Utc::now(),
    };

    match store.create_participant(&participant) {
        Ok(()) => {}
        Err(crate::error::Error::Conflict(_)) => {
            return Err(ApiError::conflict("Already a participant of this group"));
        }
        Err(_) => return Err(ApiError::internal("Failed to join group")),
    }

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(participant))))
}
