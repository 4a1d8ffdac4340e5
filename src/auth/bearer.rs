//! Bearer token extraction and verification.

use axum::http::{HeaderMap, header};

use super::errors::AuthError;
use crate::jwt::{AuthConfig, Claims};

const BEARER_SCHEME: &str = "Bearer";

/// Pull the raw token out of an `Authorization: Bearer <token>` header.
///
/// The header must split on single spaces into exactly two parts. Anything
/// else, including a missing header or a different scheme, is malformed.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MalformedHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    match value.split(' ').collect::<Vec<_>>().as_slice() {
        [BEARER_SCHEME, token] if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Verify the bearer access token on a request.
///
/// Returns the raw token together with its verified claims.
pub fn verify_bearer(
    headers: &HeaderMap,
    config: &AuthConfig,
    now: u64,
) -> Result<(String, Claims), AuthError> {
    let token = bearer_token(headers)?;
    let claims = config.verify_access_token(token, now)?;
    Ok((token.to_string(), claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{SubjectView, unix_now};
    use axum::http::HeaderValue;

    fn config() -> AuthConfig {
        AuthConfig::new(
            b"test-secret-key-for-testing-0123456789".to_vec(),
            "authgate",
            "authgate-clients",
            "localhost",
        )
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn subject() -> SubjectView {
        SubjectView {
            id: "user-1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: "ada".to_string(),
        }
    }

    #[test]
    fn test_verify_bearer_roundtrip() {
        let config = config();
        let now = unix_now();
        let pair = config.issue_token_pair(&subject(), now).unwrap();

        let headers = headers_with(&format!("Bearer {}", pair.access_token));
        let (raw, claims) = verify_bearer(&headers, &config, now).unwrap();

        assert_eq!(raw, pair.access_token);
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let result = verify_bearer(&HeaderMap::new(), &config(), unix_now());
        assert_eq!(result, Err(AuthError::MalformedHeader));
    }

    #[test]
    fn test_malformed_header_shapes() {
        let config = config();
        let now = unix_now();
        let pair = config.issue_token_pair(&subject(), now).unwrap();
        let token = pair.access_token;

        let shapes = [
            format!("Basic {}", token),
            format!("bearer {}", token),
            format!("Bearer {} extra", token),
            format!("Bearer  {}", token),
            format!("Bearer{}", token),
            "Bearer".to_string(),
            "Bearer ".to_string(),
            token.clone(),
        ];

        for shape in shapes {
            assert_eq!(
                bearer_token(&headers_with(&shape)),
                Err(AuthError::MalformedHeader),
                "header {:?}",
                shape
            );
        }
    }

    #[test]
    fn test_verifier_errors_pass_through() {
        let config = config();
        let now = unix_now();
        let pair = config.issue_token_pair(&subject(), now).unwrap();

        let headers = headers_with(&format!("Bearer {}", pair.access_token));
        let later = now + config.access_ttl.as_secs();
        assert_eq!(
            verify_bearer(&headers, &config, later),
            Err(AuthError::Expired)
        );

        let headers = headers_with("Bearer not-a-token");
        assert_eq!(
            verify_bearer(&headers, &config, now),
            Err(AuthError::MalformedToken)
        );
    }
}
