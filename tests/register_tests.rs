//! Tests for account registration.

mod common;

use authgate::db::UserRole;
use axum::http::StatusCode;
use common::{body_json, post_json, test_app};

fn register_body(email: &str, password: &str) -> String {
    serde_json::json!({
        "username": "alice",
        "first_name": "Alice",
        "last_name": "Liddell",
        "email": email,
        "password": password,
    })
    .to_string()
}

#[tokio::test]
async fn test_register_creates_user() {
    let app = test_app().await;

    let response = app
        .send(post_json(
            "/auth/api/register",
            &register_body("alice@example.com", "wonderland"),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let id = json["id"].as_str().unwrap();

    let user = app.db.users().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_ne!(user.password_hash, "wonderland");
}

#[tokio::test]
async fn test_first_registered_user_is_admin() {
    let app = test_app().await;

    let first = app
        .send(post_json(
            "/auth/api/register",
            &register_body("first@example.com", "wonderland"),
        ))
        .await;
    let second = app
        .send(post_json(
            "/auth/api/register",
            &register_body("second@example.com", "wonderland"),
        ))
        .await;

    let first_id = body_json(first).await["id"].as_str().unwrap().to_string();
    let second_id = body_json(second).await["id"].as_str().unwrap().to_string();

    let users = app.db.users();
    assert_eq!(
        users.get_by_id(&first_id).await.unwrap().unwrap().mode,
        UserRole::Admin
    );
    assert_eq!(
        users.get_by_id(&second_id).await.unwrap().unwrap().mode,
        UserRole::Default
    );
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = test_app().await;

    let response = app
        .send(post_json(
            "/auth/api/register",
            &register_body("alice@example.com", "wonderland"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send(post_json(
            "/auth/api/register",
            &register_body("ALICE@example.com", "wonderland"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let app = test_app().await;

    let cases = [
        register_body("alice@example.com", "short"),
        register_body("not-an-email", "wonderland"),
        register_body("", "wonderland"),
        r#"{"email": "alice@example.com"}"#.to_string(),
    ];

    for body in cases {
        let response = app.send(post_json("/auth/api/register", &body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
    }

    assert_eq!(app.db.users().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_registered_user_can_log_in() {
    let app = test_app().await;

    app.send(post_json(
        "/auth/api/register",
        &register_body("alice@example.com", "wonderland"),
    ))
    .await;

    let response = app
        .send(post_json(
            "/auth/api/login",
            r#"{"email": "alice@example.com", "password": "wonderland"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}
