pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::{ApiState, create_api_router};
use axum::Router;
use db::Database;
use jwt::AuthConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;

/// Prefix every API route is mounted under.
pub const API_BASE: &str = "/auth/api";

/// Default bound on a single storage lookup made while authorizing.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token signing and cookie settings
    pub auth: AuthConfig,
    pub lookup_timeout: Duration,
    /// Whether to trust X-Forwarded-For for rate limiting (requires running behind a proxy)
    pub trust_proxy: bool,
    pub bcrypt_cost: u32,
}

impl ServerConfig {
    /// Configuration with default timeouts and bcrypt cost.
    pub fn new(db: Database, auth: AuthConfig) -> Self {
        Self {
            db,
            auth,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            trust_proxy: false,
            bcrypt_cost: password::DEFAULT_COST,
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let state = ApiState {
        db: config.db.clone(),
        auth: Arc::new(config.auth.clone()),
        lookup_timeout: config.lookup_timeout,
        rate_limit: Arc::new(RateLimitConfig::new(config.trust_proxy)),
        bcrypt_cost: config.bcrypt_cost,
        dummy_hash: Arc::new(OnceLock::new()),
    };

    Router::new().nest(API_BASE, create_api_router(state))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
