//! Profile endpoints for logged-in users.
//!
//! - GET `/me` - Current user's profile
//! - GET `/user/{id}` - Any user's profile
//! - PATCH `/user/{id}` - Update own profile
//! - POST `/user/password_reset/{id}` - Change own password

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use super::ApiState;
use super::auth::{check_password, hash_in_background, revoke_current_pair};
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::CurrentUser;
use crate::db::UserSummary;
use crate::password::MIN_PASSWORD_LENGTH;

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/user/{id}", get(get_user).patch(update_user))
        .route("/user/password_reset/{id}", post(change_password))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    new_password: String,
}

async fn load_summary(state: &ApiState, id: &str) -> Result<UserSummary, ApiError> {
    state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .map(UserSummary::from)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn get_me(
    State(state): State<ApiState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_summary(&state, &user.user_id).await?))
}

async fn get_user(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    Ok(Json(load_summary(&state, &id).await?))
}

/// Replace whichever profile fields are given. Blank values are rejected.
fn merge_field(current: String, update: Option<String>, name: &str) -> Result<String, ApiError> {
    match update {
        None => Ok(current),
        Some(value) if value.trim().is_empty() => {
            Err(ApiError::bad_request(format!("{} cannot be empty", name)))
        }
        Some(value) => Ok(value.trim().to_string()),
    }
}

async fn update_user(
    State(state): State<ApiState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    if id != user.user_id {
        return Err(ApiError::forbidden("Cannot modify another user"));
    }
    let Json(update) = payload?;

    let current = load_summary(&state, &id).await?;
    let username = merge_field(current.username, update.username, "username")?;
    let first_name = merge_field(current.first_name, update.first_name, "first_name")?;
    let last_name = merge_field(current.last_name, update.last_name, "last_name")?;

    let updated = state
        .db
        .users()
        .update_profile(&id, &username, &first_name, &last_name)
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(load_summary(&state, &id).await?))
}

/// Change the caller's own password. The session that made the change is
/// revoked, so the client has to log in again with the new password.
async fn change_password(
    State(state): State<ApiState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    if id != user.user_id {
        return Err(ApiError::forbidden("Cannot change another user's password"));
    }
    let Json(request) = payload?;

    if request.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let current = state
        .db
        .users()
        .get_by_id(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if check_password(request.new_password.clone(), current.password_hash).await? {
        return Err(ApiError::bad_request(
            "The new password cannot be the same as your existing one",
        ));
    }

    let password_hash = hash_in_background(request.new_password, state.bcrypt_cost).await?;
    let updated = state
        .db
        .users()
        .set_password(&id, &password_hash)
        .await
        .db_err("Failed to change password")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    revoke_current_pair(&state, &user).await?;

    info!(user_id = %id, "Password changed");
    Ok(Json(serde_json::json!({ "message": "password changed successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_field() {
        assert_eq!(
            merge_field("old".to_string(), None, "username").unwrap(),
            "old"
        );
        assert_eq!(
            merge_field("old".to_string(), Some(" new ".to_string()), "username").unwrap(),
            "new"
        );
        assert!(merge_field("old".to_string(), Some("  ".to_string()), "username").is_err());
    }
}
