//! Login endpoints.
//!
//! Login is a two-step flow: POST `/login` checks the password and emails a
//! one-time passcode, POST `/login/otp` redeems the passcode and mints the
//! session. Credentials alone never produce tokens.

use axum::{
    Json, Router,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::validate::{normalize_email, validate_login};
use crate::auth::{
    ACCESS_COOKIE_NAME, CSRF_COOKIE_NAME, ClientIp, REFRESH_COOKIE_NAME, build_cookie,
};
use crate::csrf::CSRF_TTL_SECS;
use crate::db::{Database, UserProfile};
use crate::mailer::{Mail, Mailer};
use crate::otp::{OtpGate, OtpOutcome};
use crate::password::verify_password;
use crate::rate_limit::{CooldownGuard, Flow};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct LoginState {
    pub db: Database,
    pub sessions: SessionManager,
    pub otp: OtpGate,
    pub cooldowns: CooldownGuard,
    pub mailer: Arc<dyn Mailer>,
    pub secure_cookies: bool,
}

pub fn router(state: LoginState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/login/otp", post(login_otp))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct OtpSent {
    message: &'static str,
}

/// Step one: password check, then an emailed passcode. A bad email and a bad
/// password produce the same response.
async fn login(
    State(state): State<LoginState>,
    ClientIp(client): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_login(&payload.email, &payload.password)?;
    let email = normalize_email(&payload.email);

    if state
        .cooldowns
        .is_throttled(Flow::Login, &client, &email)
        .await
        .store_err("Failed to check login cooldown")?
    {
        return Err(ApiError::Throttled);
    }

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .store_err("Failed to look up email")?;
    let Some(user) = user else {
        return Err(ApiError::unauthorized("Invalid email or password."));
    };
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password."));
    }

    let code = state
        .otp
        .issue(&email)
        .await
        .store_err("Failed to issue OTP")?;

    state
        .mailer
        .send(Mail {
            to: email.clone(),
            subject: "Your one-time passcode".into(),
            body: format!("Your OTP is {}. It will expire in 5 minutes.", code),
        })
        .mail_err("Failed to send OTP email")?;

    state
        .cooldowns
        .arm(Flow::Login, &client, &email)
        .await
        .store_err("Failed to arm login cooldown")?;

    Ok(Json(OtpSent {
        message: "OTP sent to your email. It will expire in 5 minutes.",
    }))
}

#[derive(Deserialize)]
struct OtpRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

#[derive(Serialize)]
struct SessionInfo {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "loginTime")]
    login_time: u64,
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

#[derive(Serialize)]
struct LoginResponse {
    message: String,
    user: UserProfile,
    #[serde(rename = "sessionInfo")]
    session_info: SessionInfo,
}

/// Step two: redeem the passcode. A valid code consumes itself and mints the
/// token pair, the CSRF token, and the registry records; any prior session
/// for the account dies here.
async fn login_otp(
    State(state): State<LoginState>,
    Json(payload): Json<OtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);

    match state
        .otp
        .verify(&email, payload.otp.trim())
        .await
        .store_err("Failed to verify OTP")?
    {
        OtpOutcome::Valid => {}
        OtpOutcome::Expired => return Err(ApiError::bad_request("OTP Expired")),
        OtpOutcome::Mismatch => return Err(ApiError::bad_request("Invalid OTP")),
    }

    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .store_err("Failed to look up email")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password."))?;

    let issued = state
        .sessions
        .issue(&user.uuid)
        .await
        .store_err("Failed to issue session")?;

    let record = state
        .sessions
        .record(&issued.session_id)
        .await
        .store_err("Failed to load session record")?
        .ok_or_else(|| ApiError::internal("Internal server error"))?;

    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            build_cookie(
                ACCESS_COOKIE_NAME,
                &issued.access.token,
                issued.access.duration,
                true,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            build_cookie(
                REFRESH_COOKIE_NAME,
                &issued.refresh.token,
                issued.refresh.duration,
                true,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            build_cookie(
                CSRF_COOKIE_NAME,
                &issued.csrf_token,
                CSRF_TTL_SECS,
                false,
                state.secure_cookies,
            ),
        ),
    ]);

    let profile = UserProfile::from(&user);
    Ok((
        cookies,
        Json(LoginResponse {
            message: format!("Welcome, {}", profile.name),
            user: profile,
            session_info: SessionInfo {
                session_id: issued.session_id,
                login_time: record.created_at,
                csrf_token: issued.csrf_token,
            },
        }),
    ))
}
