//! JWT token pair issuance and verification.
//!
//! One login produces an access/refresh pair sharing a single `jti`:
//! - Access tokens: short-lived, carry issuer/audience/name, sent as `Bearer`
//! - Refresh tokens: long-lived, only `jti`/`sub`/`iat`/`exp`, sent as a cookie
//!
//! Every operation is a pure function of the [`AuthConfig`], the caller-supplied
//! current time and the token or subject input.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::AuthError;
use crate::db::User;

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 24 hours
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default refresh cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "refresh_token";

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Value of the `typ` claim on access tokens.
const ACCESS_TOKEN_TYPE: &str = "JWT";

/// Algorithm used when signing. Verification accepts the whole HMAC family.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// How strictly the refresh endpoint treats incoming refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Require `iss == config.issuer` on refresh tokens. Off by default: a
    /// refresh token proves a prior login, not issuer scoping. When enabled the
    /// issuer is also written into refresh tokens.
    pub require_issuer_match: bool,
    /// Consume the refresh token's `jti` on use so it cannot be replayed.
    pub single_use: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            require_issuer_match: false,
            single_use: true,
        }
    }
}

/// Process-wide authentication settings. Immutable after startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub cookie_domain: String,
    pub cookie_name: String,
    pub cookie_path: String,
    pub refresh_policy: RefreshPolicy,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_path", &self.cookie_path)
            .field("refresh_policy", &self.refresh_policy)
            .finish()
    }
}

/// Reasons an [`AuthConfig`] cannot be used to start the service.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("signing secret must be at least {MIN_SECRET_LENGTH} bytes")]
    SecretTooShort,
    #[error("token lifetimes must be greater than zero")]
    ZeroTtl,
    #[error("refresh token lifetime must be longer than access token lifetime")]
    RefreshNotLongerThanAccess,
    #[error("cookie name must not be empty")]
    EmptyCookieName,
}

/// Minimal identity projection used to build a token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectView {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl From<&User> for SubjectView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// A freshly signed access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Shared `jti` of both tokens
    #[serde(skip)]
    pub token_id: String,
    /// Expiration of the refresh token (Unix seconds)
    #[serde(skip)]
    pub refresh_expires_at: u64,
}

/// Claims carried by both token kinds.
///
/// Refresh tokens leave the optional fields empty (except `iss` when the
/// refresh policy requires issuer matching).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token ID shared by the pair
    pub jti: String,
    /// Subject (user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Display name, "first last"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

impl AuthConfig {
    /// Create a configuration with default lifetimes, cookie name and path.
    pub fn new(
        secret: impl Into<Vec<u8>>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        cookie_domain: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            secret: secret.into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            cookie_domain: cookie_domain.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            refresh_policy: RefreshPolicy::default(),
        }
    }

    /// Check startup invariants. A failure here must abort the process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort);
        }
        if self.access_ttl.as_secs() == 0 || self.refresh_ttl.as_secs() == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if self.refresh_ttl <= self.access_ttl {
            return Err(ConfigError::RefreshNotLongerThanAccess);
        }
        if self.cookie_name.is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }
        Ok(())
    }

    /// Build and sign an access/refresh pair for `subject`, both sharing one new `jti`.
    pub fn issue_token_pair(
        &self,
        subject: &SubjectView,
        now: u64,
    ) -> Result<TokenPair, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::SigningFailed("empty signing key".to_string()));
        }

        let token_id = uuid::Uuid::new_v4().to_string();
        let encoding_key = EncodingKey::from_secret(&self.secret);
        let header = Header::new(SIGNING_ALGORITHM);

        let access_expires_at = expiry(now, self.access_ttl)?;
        let refresh_expires_at = expiry(now, self.refresh_ttl)?;

        let access_claims = Claims {
            jti: token_id.clone(),
            sub: subject.id.clone(),
            iat: now,
            exp: access_expires_at,
            iss: Some(self.issuer.clone()),
            aud: Some(self.audience.clone()),
            name: Some(format!("{} {}", subject.first_name, subject.last_name)),
            typ: Some(ACCESS_TOKEN_TYPE.to_string()),
        };

        let refresh_claims = Claims {
            jti: token_id.clone(),
            sub: subject.id.clone(),
            iat: now,
            exp: refresh_expires_at,
            iss: self
                .refresh_policy
                .require_issuer_match
                .then(|| self.issuer.clone()),
            aud: None,
            name: None,
            typ: None,
        };

        let access_token = jsonwebtoken::encode(&header, &access_claims, &encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
        let refresh_token = jsonwebtoken::encode(&header, &refresh_claims, &encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_id,
            refresh_expires_at,
        })
    }

    /// Verify an access token: algorithm, signature, expiry, issuer, then the
    /// `typ` and `aud` claims that only access tokens carry.
    pub fn verify_access_token(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let claims = self.decode_verified(token, now)?;

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(AuthError::InvalidIssuer);
        }
        if claims.typ.as_deref() != Some(ACCESS_TOKEN_TYPE) {
            return Err(AuthError::WrongTokenType);
        }
        if claims.aud.as_deref() != Some(self.audience.as_str()) {
            return Err(AuthError::InvalidAudience);
        }

        Ok(claims)
    }

    /// Verify a refresh token: algorithm, signature and expiry. The issuer is
    /// only checked when [`RefreshPolicy::require_issuer_match`] is set.
    pub fn verify_refresh_token(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let claims = self.decode_verified(token, now)?;

        // Access tokens are marked with `typ`, refresh tokens never are.
        if claims.typ.is_some() {
            return Err(AuthError::WrongTokenType);
        }
        if self.refresh_policy.require_issuer_match
            && claims.iss.as_deref() != Some(self.issuer.as_str())
        {
            return Err(AuthError::InvalidIssuer);
        }

        Ok(claims)
    }

    fn decode_verified(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        // The header is inspected before the library sees the token so that a
        // non-HMAC `alg` is always reported as such, whatever the library does.
        let alg = header_algorithm(token)?;
        if !matches!(alg.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(AuthError::UnexpectedAlgorithm(alg));
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoding_key = DecodingKey::from_secret(&self.secret);
        let token_data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => AuthError::UnexpectedAlgorithm(alg.clone()),
                _ => AuthError::MalformedToken,
            })?;

        let claims = token_data.claims;
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}

fn expiry(now: u64, ttl: Duration) -> Result<u64, AuthError> {
    now.checked_add(ttl.as_secs())
        .ok_or_else(|| AuthError::SigningFailed("token expiry overflows".to_string()))
}

/// Read the `alg` field of a compact token's header without verifying anything.
fn header_algorithm(token: &str) -> Result<String, AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| AuthError::MalformedToken)?;
    let raw: RawHeader = serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;
    Ok(raw.alg)
}
