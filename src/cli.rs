//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{AuthConfig, ConfigError, DEFAULT_COOKIE_NAME, MIN_SECRET_LENGTH};
use crate::password::DEFAULT_COST;
use clap::Parser;
use tracing::{error, info};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "authgate",
    about = "Account authentication with bearer access tokens and refresh cookies"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "AUTHGATE_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "AUTHGATE_DATABASE", default_value = "authgate.db")]
    pub database: String,

    /// Value of the `iss` claim, checked on every access token
    #[arg(long, env = "AUTHGATE_JWT_ISSUER", default_value = "authgate")]
    pub jwt_issuer: String,

    /// Value of the `aud` claim written into access tokens
    #[arg(long, env = "AUTHGATE_JWT_AUDIENCE", default_value = "authgate-clients")]
    pub jwt_audience: String,

    /// Domain attribute of the refresh cookie (empty for host-only)
    #[arg(long, env = "AUTHGATE_COOKIE_DOMAIN", default_value = "localhost")]
    pub cookie_domain: String,

    #[arg(long, env = "AUTHGATE_COOKIE_NAME", default_value = DEFAULT_COOKIE_NAME)]
    pub cookie_name: String,

    #[arg(long, env = "AUTHGATE_COOKIE_PATH", default_value = "/")]
    pub cookie_path: String,

    #[arg(long, env = "AUTHGATE_ACCESS_TTL_MINUTES", default_value_t = 15)]
    pub access_ttl_minutes: u64,

    #[arg(long, env = "AUTHGATE_REFRESH_TTL_HOURS", default_value_t = 24)]
    pub refresh_ttl_hours: u64,

    /// Upper bound for each storage lookup made while authorizing a request
    #[arg(long, env = "AUTHGATE_LOOKUP_TIMEOUT_MS", default_value_t = 2000)]
    pub lookup_timeout_ms: u64,

    /// Let a refresh token be exchanged more than once
    #[arg(long)]
    pub allow_refresh_replay: bool,

    /// Write and check the issuer on refresh tokens too
    #[arg(long)]
    pub require_refresh_issuer: bool,

    /// Rate limit by the first X-Forwarded-For entry (only behind a trusted proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// bcrypt cost for new password hashes
    #[arg(long, default_value_t = DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} bytes. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build and validate the token configuration from arguments and the loaded secret.
pub fn build_auth_config(args: &Args, jwt_secret: String) -> Result<AuthConfig, ConfigError> {
    let mut auth = AuthConfig::new(
        jwt_secret.into_bytes(),
        args.jwt_issuer.clone(),
        args.jwt_audience.clone(),
        args.cookie_domain.clone(),
    );
    auth.access_ttl = Duration::from_secs(args.access_ttl_minutes * 60);
    auth.refresh_ttl = Duration::from_secs(args.refresh_ttl_hours * 60 * 60);
    auth.cookie_name = args.cookie_name.clone();
    auth.cookie_path = args.cookie_path.clone();
    auth.refresh_policy.single_use = !args.allow_refresh_replay;
    auth.refresh_policy.require_issuer_match = args.require_refresh_issuer;

    auth.validate()?;
    Ok(auth)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, auth: AuthConfig) -> ServerConfig {
    ServerConfig {
        db,
        auth,
        lookup_timeout: Duration::from_millis(args.lookup_timeout_ms),
        trust_proxy: args.trust_proxy,
        bcrypt_cost: args.bcrypt_cost,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
