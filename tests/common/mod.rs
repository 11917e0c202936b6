#![allow(dead_code)]

use anteroom::db::Database;
use anteroom::mailer::RecordingMailer;
use anteroom::{ServerConfig, create_app};
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub mailer: Arc<RecordingMailer>,
}

/// Fresh in-memory app with a recording mailer.
pub async fn setup() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mailer = Arc::new(RecordingMailer::new());
    let config = ServerConfig {
        db: db.clone(),
        public_origin: Url::parse("http://localhost:7320").expect("Invalid URL"),
        jwt_secret: b"test-jwt-secret-at-least-32-bytes!!".to_vec(),
        secure_cookies: false,
        mailer: mailer.clone(),
    };
    TestApp {
        app: create_app(&config),
        db,
        mailer,
    }
}

/// Send a request and return the raw response. `headers` carries extras like
/// `cookie`, `x-csrf-token`, or `x-forwarded-for`.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All Set-Cookie values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Extract `name=value` from a list of Set-Cookie values.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// A `Cookie:` header carrying the three auth cookies from a login response.
pub fn auth_cookie_header(cookies: &[String]) -> String {
    format!(
        "accessToken={}; refreshToken={}; csrfToken={}",
        cookie_value(cookies, "accessToken").expect("no access cookie"),
        cookie_value(cookies, "refreshToken").expect("no refresh cookie"),
        cookie_value(cookies, "csrfToken").expect("no csrf cookie"),
    )
}

/// Pull the verification token out of the last mail sent to `email`.
pub fn verification_token(mailer: &RecordingMailer, email: &str) -> String {
    let mail = mailer.last_to(email).expect("no mail recorded");
    let marker = "/token/";
    let start = mail.body.find(marker).expect("no link in mail") + marker.len();
    mail.body[start..]
        .split_whitespace()
        .next()
        .unwrap()
        .to_string()
}

/// Pull the 6-digit OTP out of the last mail sent to `email`.
pub fn otp_code(mailer: &RecordingMailer, email: &str) -> String {
    let mail = mailer.last_to(email).expect("no mail recorded");
    mail.body
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| s.len() == 6)
        .expect("no OTP in mail")
        .to_string()
}

/// Register and verify an account, returning its public id (uuid).
pub async fn create_account(ctx: &TestApp, name: &str, email: &str, password: &str) -> String {
    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/register",
        &[],
        Some(serde_json::json!({
            "name": name,
            "email": email,
            "password": password,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = verification_token(&ctx.mailer, email);
    let response = send(
        &ctx.app,
        "GET",
        &format!("/api/v1/verify/{}", token),
        &[],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["user"]["id"].as_str().unwrap().to_string()
}

/// Full two-step login as seen from `client` (distinct addresses dodge the
/// per-client cooldown between logins). Returns the login response cookies.
pub async fn login_from(ctx: &TestApp, client: &str, email: &str, password: &str) -> Vec<String> {
    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/login",
        &[("x-forwarded-for", client)],
        Some(serde_json::json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let otp = otp_code(&ctx.mailer, email);
    let response = send(
        &ctx.app,
        "POST",
        "/api/v1/login/otp",
        &[],
        Some(serde_json::json!({ "email": email, "otp": otp })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    set_cookies(&response)
}

/// Two-step login from a default client address.
pub async fn login(ctx: &TestApp, email: &str, password: &str) -> Vec<String> {
    login_from(ctx, "198.51.100.1", email, password).await
}
