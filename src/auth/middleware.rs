//! Authorization gates.
//!
//! Both gates are `axum::middleware::from_fn_with_state` functions:
//! - [`auth_required`]: valid, unrevoked bearer access token
//! - [`admin_required`]: the above, plus the subject's live mode is `admin`
//!
//! On success the verified identity is stored as a [`CurrentUser`] request
//! extension. Every response leaving a gate, accepted or rejected, carries
//! `Vary: Authorization`.

use std::future::Future;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::bearer::verify_bearer;
use super::errors::{ApiAuthError, AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::UserRole;
use crate::jwt::{Claims, unix_now};

/// Identity established by a gate for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Verified subject (user id)
    pub user_id: String,
    /// Raw bearer token as presented
    pub token: String,
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiAuthError::new(AuthErrorKind::NotAuthenticated))
    }
}

/// Run a repository call under `timeout`.
///
/// Both a storage error and an elapsed timeout become
/// [`AuthError::RepositoryUnavailable`].
pub async fn bounded_lookup<T, F>(timeout: Duration, lookup: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!(error = %e, "Repository lookup failed");
            Err(AuthError::RepositoryUnavailable)
        }
        Err(_) => {
            error!(timeout_ms = timeout.as_millis() as u64, "Repository lookup timed out");
            Err(AuthError::RepositoryUnavailable)
        }
    }
}

/// Verify the bearer token and make sure its id has not been revoked.
async fn authenticate<S>(state: &S, headers: &HeaderMap) -> Result<CurrentUser, AuthError>
where
    S: HasAuthBackend,
{
    let (token, claims) = verify_bearer(headers, state.auth(), unix_now())?;

    let revoked = bounded_lookup(
        state.lookup_timeout(),
        state.db().revocations().is_revoked(&claims.jti),
    )
    .await?;
    if revoked {
        return Err(AuthError::Revoked);
    }

    Ok(CurrentUser {
        user_id: claims.sub.clone(),
        token,
        claims,
    })
}

/// Check that the subject still exists and is currently an administrator.
async fn authorize_admin<S>(state: &S, user: &CurrentUser) -> Result<(), ApiAuthError>
where
    S: HasAuthBackend,
{
    let record = bounded_lookup(
        state.lookup_timeout(),
        state.db().users().get_by_id(&user.user_id),
    )
    .await?
    .ok_or(AuthError::UnknownSubject)?;

    if record.mode != UserRole::Admin {
        debug!(user_id = %user.user_id, mode = record.mode.as_str(), "Admin access denied");
        return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
    }

    Ok(())
}

fn with_vary(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

fn reject(error: AuthError) -> Response {
    debug!(reason = %error, "Request rejected");
    ApiAuthError::from(error).into_response()
}

/// Gate requiring a valid access token.
pub async fn auth_required<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let result = authenticate(&state, request.headers()).await;
    let response = match result {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => reject(e),
    };
    with_vary(response)
}

/// Gate requiring a valid access token whose subject is an administrator.
///
/// The mode is always read from storage, never from the token.
pub async fn admin_required<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let result = authenticate(&state, request.headers()).await;
    let user = match result {
        Ok(user) => user,
        Err(e) => return with_vary(reject(e)),
    };

    let response = match authorize_admin(&state, &user).await {
        Ok(()) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    };
    with_vary(response)
}
