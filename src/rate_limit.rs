//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-client tracking to slow down
//! password guessing.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

/// Per-client keyed limiter.
pub type ClientLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SECOND: NonZeroU32 = NonZeroU32::MIN;
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Key used when no client address can be determined.
const LOCAL_CLIENT: &str = "local";

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login attempts: 1 per second per client, burst of 5
    pub login: Arc<ClientLimiter>,
    /// Key clients by the first `X-Forwarded-For` entry
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    pub fn new(trust_proxy: bool) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(LOGIN_PER_SECOND).allow_burst(LOGIN_BURST),
            )),
            trust_proxy,
        }
    }
}

/// Determine the key a request is rate limited under.
pub fn client_key(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| LOCAL_CLIENT.to_string())
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        config.trust_proxy,
    );

    match config.login.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(client = %key, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
