pub mod access;
mod admins;
mod groups;
mod notes;
mod participants;
mod tasks;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Groups
        .route("/groups", post(groups::create_group))
        .route("/groups", get(groups::list_groups))
        .route("/groups/join", post(groups::join_group))
        .route("/groups/{id}", get(groups::get_group))
        .route("/groups/{id}", patch(groups::update_group))
        .route("/groups/{id}", delete(groups::delete_group))
        // Participants
        .route(
            "/groups/{id}/participants",
            get(participants::list_participants),
        )
        .route("/groups/{id}/leave", post(participants::leave_group))
        .route(
            "/groups/{id}/participants/{participant_id}",
            delete(participants::kick_participant),
        )
        // Admins
        .route("/groups/{id}/admins", post(admins::promote_admin))
        .route(
            "/groups/{id}/admins/{participant_id}",
            delete(admins::demote_admin),
        )
        // Tasks
        .route("/groups/{id}/tasks", get(tasks::list_tasks))
        .route("/groups/{id}/tasks", post(tasks::create_task))
        .route("/tasks/{id}", patch(tasks::update_task))
        .route("/tasks/{id}", delete(tasks::delete_task))
        // Notes
        .route("/tasks/{id}/notes", get(notes::list_notes))
        .route(
            "/groups/{id}/tasks/{task_id}/notes",
            post(notes::create_note),
        )
        .route("/notes/{id}", delete(notes::delete_note))
}
