//! Refresh cookie construction and lookup.

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::CookieBuilder;
use time::OffsetDateTime;

use crate::jwt::AuthConfig;

/// Result of looking for the refresh cookie in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCookie<'a> {
    Absent,
    Present(&'a str),
    /// More than one cookie carried the configured name.
    Ambiguous,
}

/// Build the cookie carrying a freshly issued refresh token.
pub fn build_cookie(refresh_token: &str, config: &AuthConfig, now: u64) -> Cookie<'static> {
    let ttl_secs = config.refresh_ttl.as_secs() as i64;
    let expires = OffsetDateTime::from_unix_timestamp(now as i64 + ttl_secs)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    base_cookie(config, refresh_token.to_string())
        .expires(expires)
        .max_age(time::Duration::seconds(ttl_secs))
        .build()
}

/// Build the logout counterpart: empty value, `Max-Age=-1`, expires at the epoch.
pub fn build_expired_cookie(config: &AuthConfig) -> Cookie<'static> {
    base_cookie(config, String::new())
        .expires(OffsetDateTime::UNIX_EPOCH)
        .max_age(time::Duration::seconds(-1))
        .build()
}

fn base_cookie(config: &AuthConfig, value: String) -> CookieBuilder<'static> {
    let builder = Cookie::build((config.cookie_name.clone(), value))
        .path(config.cookie_path.clone())
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict);

    if config.cookie_domain.is_empty() {
        builder
    } else {
        builder.domain(config.cookie_domain.clone())
    }
}

/// Collect every value of cookie `name` across all Cookie headers, in order.
pub fn get_cookies<'a>(headers: &'a HeaderMap, name: &str) -> Vec<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookie_header| cookie_header.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .filter(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .collect()
}

/// Find the refresh cookie. Duplicates are reported instead of picking one.
pub fn find_refresh_cookie<'a>(headers: &'a HeaderMap, config: &AuthConfig) -> RefreshCookie<'a> {
    match get_cookies(headers, &config.cookie_name).as_slice() {
        [] => RefreshCookie::Absent,
        [value] => RefreshCookie::Present(value),
        _ => RefreshCookie::Ambiguous,
    }
}
