use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};

pub async fn delete_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_token(&id)
        .api_err("Failed to delete token")?;

    if !deleted {
        return Err(ApiError::not_found("Token not found"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(serde_json::json!({
        "deleted": true
    }))))
}
