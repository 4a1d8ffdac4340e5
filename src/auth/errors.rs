//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failures produced by token verification, issuance and the lookups the
/// gates perform. None of these are fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MalformedHeader,
    #[error("token is not a well-formed signed token")]
    MalformedToken,
    #[error("unexpected signing algorithm: {0}")]
    UnexpectedAlgorithm(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer is invalid")]
    InvalidIssuer,
    #[error("token audience is invalid")]
    InvalidAudience,
    #[error("token is not of the expected kind")]
    WrongTokenType,
    #[error("token has been revoked")]
    Revoked,
    #[error("token subject does not exist")]
    UnknownSubject,
    #[error("failed to sign token: {0}")]
    SigningFailed(String),
    #[error("repository unavailable")]
    RepositoryUnavailable,
}

/// Internal kind used by the gates to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InsufficientRole,
    Internal,
}

/// Rejection returned by the authorization gates.
///
/// Every verifier failure collapses into the same 401 body so that clients
/// cannot tell which check failed.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::Internal => "Internal server error",
        }
    }
}

impl From<AuthError> for ApiAuthError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RepositoryUnavailable | AuthError::SigningFailed(_) => {
                Self::new(AuthErrorKind::Internal)
            }
            _ => Self::new(AuthErrorKind::NotAuthenticated),
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
