use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Group;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct GroupDetailResponse {
    #[serde(flatten)]
    pub group: Group,
    /// Derived from the authorization predicates, never persisted.
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct PromoteAdminRequest {
    pub participant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: crate::types::Token,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}
