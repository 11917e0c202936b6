//! Registration flow tests: staging, email verification, throttling, and
//! input validation.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_register_and_verify_creates_account() {
    let ctx = setup().await;

    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[],
        Some(json!({
            "name": "Ann",
            "email": "ann@x.com",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("verification link"));

    // No account yet, only a staged registration
    assert!(ctx.db.users().get_by_email("ann@x.com").await.unwrap().is_none());

    let token = verification_token(&ctx.mailer, "ann@x.com");
    let response = send(&ctx.app, "GET", &format!("/api/v1/verify/{}", token), &[], None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ann@x.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"]["password_hash"].is_null());

    assert!(ctx.db.users().get_by_email("ann@x.com").await.unwrap().is_some());
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let ctx = setup().await;

    send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[],
        Some(json!({ "name": "Ann", "email": "ann@x.com", "password": "password123" })),
    )
    .await;
    let token = verification_token(&ctx.mailer, "ann@x.com");

    let first = send(&ctx.app, "GET", &format!("/api/v1/verify/{}", token), &[], None).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = send(&ctx.app, "GET", &format!("/api/v1/verify/{}", token), &[], None).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body = body_json(second).await;
    assert_eq!(body["message"], "Verification Link is expired");
}

#[tokio::test]
async fn test_unknown_verification_token() {
    let ctx = setup().await;

    let response = send(&ctx.app, "GET", "/api/v1/verify/not-a-real-token", &[], None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Verification Link is expired");
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let ctx = setup().await;
    create_account(&ctx, "Ann", "ann@x.com", "password123").await;

    // Different client address so the cooldown does not mask the conflict
    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[("x-forwarded-for", "203.0.113.9")],
        Some(json!({ "name": "Ann2", "email": "Ann@X.com", "password": "password456" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User with this email already exists.");
}

#[tokio::test]
async fn test_register_throttled_per_client_and_email() {
    let ctx = setup().await;

    let first = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[("x-forwarded-for", "203.0.113.1")],
        Some(json!({ "name": "Ann", "email": "ann@x.com", "password": "password123" })),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[("x-forwarded-for", "203.0.113.1")],
        Some(json!({ "name": "Ann", "email": "ann@x.com", "password": "password123" })),
    )
    .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client is not throttled
    let other = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[("x-forwarded-for", "203.0.113.2")],
        Some(json!({ "name": "Ann", "email": "ann@x.com", "password": "password123" })),
    )
    .await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_validation_collects_field_errors() {
    let ctx = setup().await;

    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[],
        Some(json!({ "name": "ab", "email": "not-an-email", "password": "short" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"].as_array().unwrap().len(), 3);
    assert_eq!(body["message"], "Name must be at least 3 char");
}

#[tokio::test]
async fn test_register_normalizes_email() {
    let ctx = setup().await;

    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[],
        Some(json!({ "name": "Ann", "email": "  Ann@X.Com ", "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Mail goes to the normalized address and the account stores it
    let token = verification_token(&ctx.mailer, "ann@x.com");
    let response = send(&ctx.app, "GET", &format!("/api/v1/verify/{}", token), &[], None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ann@x.com");
}
