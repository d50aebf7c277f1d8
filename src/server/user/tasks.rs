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
use crate::server::dto::{CreateTaskRequest, UpdateTaskRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_task_title;
use crate::types::Task;

use super::access::{is_group_admin, is_task_owner};

pub async fn list_tasks(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    let tasks = store
        .list_group_tasks(&id)
        .api_err("Failed to list tasks")?;

    // Empty is 404 on the wire; existing clients depend on it.
    if tasks.is_empty() {
        return Err(ApiError::not_found("No tasks in this group"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(tasks)))
}

pub async fn create_task(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    validate_task_title(&req.title)?;

    let store = state.store.as_ref();

    let group = store
        .get_group(&id)
        .api_err("Failed to get group")?
        .or_not_found("Group not found")?;

    // Reported as not-found rather than forbidden so a non-member learns
    // nothing about the group.
    let participant = store
        .find_participant(&auth.user.id, &id)
        .api_err("Failed to check membership")?
        .or_not_found("You are not in this group")?;

    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: req.title,
        description: req.description,
        priority: req.priority,
        due_date: req.due_date,
        finished: false,
        participant_id: participant.id,
        group_id: group.id,
        created_at: Utc::now(),
    };

    store.create_task(&task).api_err("Failed to create task")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(task))))
}

/// Task mutations are gated on the authoring participant or a group admin.
fn require_task_access(
    store: &dyn crate::store::Store,
    user_id: &str,
    task: &Task,
) -> Result<(), ApiError> {
    let owner = is_task_owner(store, user_id, &task.id).api_err("Failed to check task owner")?;
    let admin = is_group_admin(store, user_id, &task.group_id)
        .api_err("Failed to check admin status")?
        .unwrap_or(false);

    if !owner && !admin {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    Ok(())
}

pub async fn update_task(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> impl IntoResponse {
    if let Some(title) = &req.title {
        validate_task_title(title)?;
    }

    let store = state.store.as_ref();

    let mut task = store
        .get_task(&id)
        .api_err("Failed to get task")?
        .or_not_found("Task not found")?;

    require_task_access(store, &auth.user.id, &task)?;

    if let Some(title) = req.title {
        task.title = title;
    }
    if let Some(description) = req.description {
        task.description = description;
    }
    if let Some(priority) = req.priority {
        task.priority = priority;
    }
    if let Some(due_date) = req.due_date {
        task.due_date = due_date;
    }
    if let Some(finished) = req.finished {
        task.finished = finished;
    }

    store.update_task(&task).api_err("Failed to update task")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(task)))
}

pub async fn delete_task(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let task = store
        .get_task(&id)
        .api_err("Failed to get task")?
        .or_not_found("Task not found")?;

    require_task_access(store, &auth.user.id, &task)?;

    store.delete_task(&task.id).api_err("Failed to delete task")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "deleted": true
    }))))
}
