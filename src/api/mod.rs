mod admin;
mod auth;
mod error;
mod users;

use axum::{Router, middleware};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::auth::{admin_required, auth_required};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::AuthConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt, validate_uuid};

/// State shared by every API handler and both gates.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    pub auth: Arc<AuthConfig>,
    pub lookup_timeout: Duration,
    pub rate_limit: Arc<RateLimitConfig>,
    /// bcrypt cost for newly registered passwords
    pub bcrypt_cost: u32,
    /// Hash checked on logins for unknown emails, built on first use.
    pub dummy_hash: Arc<OnceLock<String>>,
}

impl_has_auth_backend!(ApiState);

/// Create the API router.
///
/// - public: `/login`, `/refresh`, `/register`
/// - `/logged_in/*`: bearer token required
/// - `/admin/*`: bearer token of a current administrator required
pub fn create_api_router(state: ApiState) -> Router {
    let logged_in = auth::session_router()
        .merge(users::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_required::<ApiState>,
        ));

    let admin = admin::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        admin_required::<ApiState>,
    ));

    Router::new()
        .merge(auth::router(state.rate_limit.clone()))
        .nest("/logged_in", logged_in)
        .nest("/admin", admin)
        .with_state(state)
}
