//! Admin API endpoints.
//!
//! All endpoints sit behind the admin gate.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
};
use serde::Deserialize;
use tracing::info;

use super::ApiState;
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::CurrentUser;
use crate::db::UserRole;

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .route("/users/{id}/mode", put(set_mode))
}

#[derive(Deserialize)]
struct SetModeRequest {
    mode: UserRole,
}

async fn list_users(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

/// Delete an account. Its outstanding tokens stop working at the next
/// refresh or admin check.
async fn delete_user(
    State(state): State<ApiState>,
    admin: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let deleted = state
        .db
        .users()
        .delete(&id)
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin_id = %admin.user_id, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_mode(
    State(state): State<ApiState>,
    admin: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<SetModeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    let Json(request) = payload?;

    let updated = state
        .db
        .users()
        .set_mode(&id, request.mode)
        .await
        .db_err("Failed to set mode")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!(
        admin_id = %admin.user_id,
        user_id = %id,
        mode = request.mode.as_str(),
        "User mode changed"
    );
    Ok(StatusCode::NO_CONTENT)
}
