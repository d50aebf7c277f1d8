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
use crate::server::dto::CreateNoteRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_note_content;
use crate::types::Note;

use super::access::{is_group_admin, is_note_owner};

pub async fn list_notes(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_task(&id)
        .api_err("Failed to get task")?
        .or_not_found("Task not found")?;

    let notes = store
        .list_task_notes(&id)
        .api_err("Failed to list notes")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(notes)))
}

pub async fn create_note(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((group_id, task_id)): Path<(String, String)>,
    Json(req): Json<CreateNoteRequest>,
) -> impl IntoResponse {
    validate_note_content(&req.content)?;

    let store = state.store.as_ref();

    let participant = store
        .find_participant(&auth.user.id, &group_id)
        .api_err("Failed to check membership")?
        .ok_or_else(|| ApiError::forbidden("Insufficient permissions"))?;

    let task = store
        .get_task(&task_id)
        .api_err("Failed to get task")?
        .filter(|t| t.group_id == group_id)
        .or_not_found("Task not found")?;

    let note = Note {
        id: Uuid::new_v4().to_string(),
        content: req.content,
        participant_id: participant.id,
        task_id: task.id,
        created_at: Utc::now(),
    };

    store.create_note(&note).api_err("Failed to create note")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(note))))
}

/// Deleting a note takes BOTH authorship and admin rights, not either one.
pub async fn delete_note(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let note = store
        .get_note(&id)
        .api_err("Failed to get note")?
        .or_not_found("Note not found")?;

    let task = store
        .get_task(&note.task_id)
        .api_err("Failed to get task")?
        .or_not_found("Task not found")?;

    let owner = is_note_owner(store, &auth.user.id, &note.id)
        .api_err("Failed to check note owner")?;
    let admin = is_group_admin(store, &auth.user.id, &task.group_id)
        .api_err("Failed to check admin status")?
        .unwrap_or(false);

    if !owner || !admin {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    store.delete_note(&note.id).api_err("Failed to delete note")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "deleted": true
    }))))
}
