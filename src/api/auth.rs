//! Session API endpoints.
//!
//! - POST `/login` - Exchange email and password for a token pair
//! - POST `/refresh` - Exchange the refresh cookie for a new token pair
//! - POST `/register` - Create an account
//! - POST `/logged_in/logout` - Revoke the current pair and expire the cookie

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::ApiState;
use super::error::{ApiError, ResultExt};
use crate::auth::{
    CurrentUser, RefreshCookie, bounded_lookup, build_cookie, build_expired_cookie,
    find_refresh_cookie,
};
use crate::db::{NewUser, is_unique_violation};
use crate::jwt::{AuthConfig, SubjectView, TokenPair, unix_now};
use crate::password::{MIN_PASSWORD_LENGTH, hash_password_with_cost, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

/// Never matches a real account, only used to spend one bcrypt verify.
const DUMMY_PASSWORD: &str = "authgate-unknown-account";

const INVALID_REFRESH: &str = "invalid refresh token";

pub fn router(rate_limit: Arc<RateLimitConfig>) -> Router<ApiState> {
    Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(rate_limit, rate_limit_login))
        .route("/refresh", post(refresh))
        .route("/register", post(register))
}

/// Routes that sit behind the authentication gate.
pub fn session_router() -> Router<ApiState> {
    Router::new().route("/logout", post(logout))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: String,
}

/// Token pair in the body, refresh token again in the cookie.
fn session_response(config: &AuthConfig, pair: TokenPair, now: u64) -> Response {
    let cookie = build_cookie(&pair.refresh_token, config, now);
    (StatusCode::OK, [(SET_COOKIE, cookie.to_string())], Json(pair)).into_response()
}

/// bcrypt is deliberately slow, keep it off the async workers.
pub(super) async fn check_password(password: String, hash: String) -> Result<bool, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            error!(error = %e, "Password check task failed");
            ApiError::internal("Failed to check password")
        })?;

    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            error!(error = %e, "Stored password hash is unreadable");
            Ok(false)
        }
    }
}

pub(super) async fn hash_in_background(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost))
        .await
        .map_err(|e| {
            error!(error = %e, "Password hash task failed");
            ApiError::internal("Failed to hash password")
        })?
        .map_err(|e| {
            error!(error = %e, "Failed to hash password");
            ApiError::internal("Failed to hash password")
        })
}

/// Hash that unknown-email logins are checked against, so they cost the
/// same bcrypt work as a wrong password.
async fn dummy_hash(state: &ApiState) -> Result<String, ApiError> {
    if let Some(hash) = state.dummy_hash.get() {
        return Ok(hash.clone());
    }
    let hash = hash_in_background(DUMMY_PASSWORD.to_string(), state.bcrypt_cost).await?;
    Ok(state.dummy_hash.get_or_init(|| hash).clone())
}

async fn login(
    State(state): State<ApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let user = state
        .db
        .users()
        .get_by_email(request.email.trim())
        .await
        .db_err("Failed to look up user")?;

    let Some(user) = user else {
        check_password(request.password, dummy_hash(&state).await?).await?;
        debug!("Login rejected: unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !check_password(request.password, user.password_hash.clone()).await? {
        debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let now = unix_now();
    let pair = state
        .auth
        .issue_token_pair(&SubjectView::from(&user), now)
        .map_err(|e| {
            error!(error = %e, "Failed to issue token pair");
            ApiError::internal("Failed to generate token")
        })?;

    info!(user_id = %user.id, "User logged in");
    Ok(session_response(&state.auth, pair, now))
}

/// Exchange a refresh cookie for a new pair.
///
/// cookie -> verify -> user lookup -> single-use check -> reissue.
/// Every failure after the cookie was found is a 401.
async fn refresh(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = match find_refresh_cookie(&headers, &state.auth) {
        RefreshCookie::Present(token) => token,
        RefreshCookie::Absent => return Err(ApiError::bad_request("Missing refresh token")),
        RefreshCookie::Ambiguous => {
            return Err(ApiError::bad_request("Multiple refresh tokens"));
        }
    };

    let now = unix_now();
    let claims = state.auth.verify_refresh_token(token, now).map_err(|e| {
        debug!(reason = %e, "Refresh rejected");
        ApiError::unauthorized(INVALID_REFRESH)
    })?;

    let user = bounded_lookup(state.lookup_timeout, state.db.users().get_by_id(&claims.sub))
        .await
        .map_err(|_| ApiError::unauthorized(INVALID_REFRESH))?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "Refresh rejected: unknown user");
            ApiError::unauthorized("unknown user")
        })?;

    if state.auth.refresh_policy.single_use {
        let first_use = bounded_lookup(
            state.lookup_timeout,
            state.db.revocations().consume(&claims.jti, claims.exp),
        )
        .await
        .map_err(|_| ApiError::unauthorized(INVALID_REFRESH))?;

        if !first_use {
            warn!(user_id = %user.id, jti = %claims.jti, "Refresh token replayed");
            return Err(ApiError::unauthorized(INVALID_REFRESH));
        }
    } else {
        let revoked = bounded_lookup(
            state.lookup_timeout,
            state.db.revocations().is_revoked(&claims.jti),
        )
        .await
        .map_err(|_| ApiError::unauthorized(INVALID_REFRESH))?;

        if revoked {
            debug!(jti = %claims.jti, "Refresh rejected: token revoked");
            return Err(ApiError::unauthorized(INVALID_REFRESH));
        }
    }

    let pair = state
        .auth
        .issue_token_pair(&SubjectView::from(&user), now)
        .map_err(|e| {
            error!(error = %e, "Failed to reissue token pair");
            ApiError::unauthorized(INVALID_REFRESH)
        })?;

    info!(user_id = %user.id, "Session refreshed");
    Ok(session_response(&state.auth, pair, now))
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    let fields = [
        ("username", &request.username),
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
        ("email", &request.email),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request(format!("{} cannot be empty", name)));
        }
    }

    let valid_email = request
        .email
        .trim()
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_email {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    validate_registration(&request)?;

    let password_hash = hash_in_background(request.password, state.bcrypt_cost).await?;

    let new_user = NewUser {
        username: request.username.trim().to_string(),
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        email: request.email.trim().to_string(),
        password_hash,
    };

    let user = match state.db.users().create(&new_user).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(user_id = %user.id, mode = user.mode.as_str(), "User registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { id: user.id })))
}

/// Revoke the pair behind the caller's bearer token.
pub(super) async fn revoke_current_pair(
    state: &ApiState,
    user: &CurrentUser,
) -> Result<(), ApiError> {
    // Both tokens of a pair share `iat`, so this is the refresh token's expiry.
    let pair_expires_at = user
        .claims
        .iat
        .saturating_add(state.auth.refresh_ttl.as_secs());
    state
        .db
        .revocations()
        .revoke(&user.claims.jti, pair_expires_at)
        .await
        .db_err("Failed to revoke token")
}

/// Revoke the bearer token's pair and, if present, the pair behind the
/// refresh cookie, then expire the cookie.
async fn logout(
    State(state): State<ApiState>,
    user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    revoke_current_pair(&state, &user).await?;

    if let RefreshCookie::Present(token) = find_refresh_cookie(&headers, &state.auth) {
        if let Ok(claims) = state.auth.verify_refresh_token(token, unix_now()) {
            if claims.sub == user.user_id && claims.jti != user.claims.jti {
                state
                    .db
                    .revocations()
                    .revoke(&claims.jti, claims.exp)
                    .await
                    .db_err("Failed to revoke refresh token")?;
            }
        }
    }

    info!(user_id = %user.user_id, "User logged out");

    let cookie = build_expired_cookie(&state.auth);
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie.to_string())],
        Json(serde_json::json!({ "success": true })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.com".to_string(),
            password: "wonderland".to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(validate_registration(&request()).is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let blank_username = RegisterRequest {
            username: "   ".to_string(),
            ..request()
        };
        assert!(matches!(
            validate_registration(&blank_username),
            Err(ApiError::BadRequest(_))
        ));

        let blank_last = RegisterRequest {
            last_name: String::new(),
            ..request()
        };
        assert!(validate_registration(&blank_last).is_err());
    }

    #[test]
    fn test_invalid_email_rejected() {
        for email in ["alice", "@example.com", "alice@"] {
            let invalid = RegisterRequest {
                email: email.to_string(),
                ..request()
            };
            assert!(validate_registration(&invalid).is_err(), "{}", email);
        }
    }

    async fn state() -> ApiState {
        let config = AuthConfig::new(
            b"test-secret-key-for-testing-0123456789".to_vec(),
            "authgate",
            "authgate-clients",
            "localhost",
        );
        ApiState {
            db: crate::db::Database::open(":memory:").await.unwrap(),
            auth: Arc::new(config),
            lookup_timeout: crate::DEFAULT_LOOKUP_TIMEOUT,
            rate_limit: Arc::new(RateLimitConfig::new(false)),
            bcrypt_cost: 4,
            dummy_hash: Arc::default(),
        }
    }

    #[tokio::test]
    async fn test_unknown_email_still_checks_a_hash() {
        let state = state().await;
        assert!(state.dummy_hash.get().is_none());

        let request = LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "whatever".to_string(),
        };
        let result = login(State(state.clone()), Ok(Json(request))).await;

        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
        let hash = state.dummy_hash.get().unwrap();
        assert!(verify_password(DUMMY_PASSWORD, hash).unwrap());
    }

    #[tokio::test]
    async fn test_dummy_hash_is_built_once() {
        let state = state().await;

        let first = dummy_hash(&state).await.unwrap();
        let second = dummy_hash(&state).await.unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_short_password_rejected() {
        let short = RegisterRequest {
            password: "short".to_string(),
            ..request()
        };
        assert!(validate_registration(&short).is_err());
    }
}
