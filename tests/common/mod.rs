#![allow(dead_code)]

use authgate::{
    ServerConfig, create_app,
    db::{Database, NewUser, User, UserRole},
    jwt::{AuthConfig, SubjectView, TokenPair, unix_now},
    password::hash_password_with_cost,
};
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-testing-0123456789";
pub const PASSWORD: &str = "correct horse";

/// Lowest bcrypt cost, keeps tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub auth: AuthConfig,
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET, "authgate", "authgate-clients", "localhost")
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Build an app over a fresh in-memory database, letting the caller tweak the config.
pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), test_auth_config());
    config.bcrypt_cost = TEST_BCRYPT_COST;
    configure(&mut config);

    TestApp {
        app: create_app(&config),
        db,
        auth: config.auth,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Create a user with [`PASSWORD`] and the given mode.
    pub async fn create_user(&self, email: &str, mode: UserRole) -> User {
        let user = self
            .db
            .users()
            .create(&NewUser {
                username: email.split('@').next().unwrap().to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: email.to_string(),
                password_hash: hash_password_with_cost(PASSWORD, TEST_BCRYPT_COST).unwrap(),
            })
            .await
            .unwrap();
        self.db.users().set_mode(&user.id, mode).await.unwrap();
        self.db.users().get_by_id(&user.id).await.unwrap().unwrap()
    }

    /// Issue a pair directly, bypassing the login endpoint and its rate limit.
    pub fn issue(&self, user: &User) -> TokenPair {
        self.issue_at(user, unix_now())
    }

    pub fn issue_at(&self, user: &User, now: u64) -> TokenPair {
        self.auth
            .issue_token_pair(&SubjectView::from(user), now)
            .unwrap()
    }

    pub fn refresh_cookie(&self, pair: &TokenPair) -> String {
        format!("{}={}", self.auth.cookie_name, pair.refresh_token)
    }
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json_with_bearer(method: &str, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/auth/api/refresh");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn has_vary_authorization(response: &Response<Body>) -> bool {
    response
        .headers()
        .get_all(header::VARY)
        .iter()
        .any(|v| v == "Authorization")
}

/// Compact signed token shape: three non-empty dot-separated segments.
pub fn is_jwt_shaped(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
}
