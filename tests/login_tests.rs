//! Tests for the login endpoint.

mod common;

use authgate::db::UserRole;
use axum::http::StatusCode;
use common::{PASSWORD, body_json, is_jwt_shaped, post_json, set_cookie, test_app};

fn login_body(email: &str, password: &str) -> String {
    serde_json::json!({ "email": email, "password": password }).to_string()
}

#[tokio::test]
async fn test_login_success_returns_pair_and_cookie() {
    let app = test_app().await;
    let user = app.create_user("a@b.com", UserRole::Default).await;

    let response = app
        .send(post_json("/auth/api/login", &login_body("a@b.com", PASSWORD)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response).expect("Set-Cookie header missing");
    assert!(cookie.starts_with("refresh_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));

    let json = body_json(response).await;
    let access = json["access_token"].as_str().unwrap();
    let refresh = json["refresh_token"].as_str().unwrap();
    assert!(is_jwt_shaped(access));
    assert!(is_jwt_shaped(refresh));
    assert!(cookie.contains(refresh));

    // Only the two tokens are exposed.
    assert_eq!(json.as_object().unwrap().len(), 2);

    let claims = app.auth.verify_access_token(access, authgate::jwt::unix_now()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.name.as_deref(), Some("Test User"));
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let app = test_app().await;
    app.create_user("alice@example.com", UserRole::Default).await;

    let response = app
        .send(post_json(
            "/auth/api/login",
            &login_body("  Alice@Example.com ", PASSWORD),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = test_app().await;
    app.create_user("a@b.com", UserRole::Default).await;

    let wrong_password = app
        .send(post_json("/auth/api/login", &login_body("a@b.com", "incorrect")))
        .await;
    let unknown_email = app
        .send(post_json("/auth/api/login", &login_body("nobody@b.com", PASSWORD)))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&wrong_password).is_none());

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a, b);
    assert_eq!(a["error"], "invalid email or password");
}

#[tokio::test]
async fn test_login_bad_json() {
    let app = test_app().await;

    let response = app.send(post_json("/auth/api/login", "{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(post_json("/auth/api/login", r#"{"email": "a@b.com"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let app = test_app().await;
    app.create_user("a@b.com", UserRole::Default).await;

    // Burst of five, then the bucket is empty.
    for _ in 0..5 {
        let response = app
            .send(post_json("/auth/api/login", &login_body("a@b.com", "incorrect")))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .send(post_json("/auth/api/login", &login_body("a@b.com", PASSWORD)))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_does_not_apply_to_register() {
    let app = test_app().await;

    for i in 0..7 {
        let body = serde_json::json!({
            "username": format!("user{}", i),
            "first_name": "Test",
            "last_name": "User",
            "email": format!("user{}@example.com", i),
            "password": "long enough",
        });
        let response = app
            .send(post_json("/auth/api/register", &body.to_string()))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
