//! Registration endpoints.
//!
//! - POST `/register` - Validate, throttle, stage a pending registration,
//!   email a verification link
//! - GET `/verify/{token}` - Consume the link, create the account

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ResultExt};
use super::validate::{normalize_email, validate_registration};
use crate::auth::ClientIp;
use crate::db::{Database, UserProfile};
use crate::mailer::{Mail, Mailer};
use crate::password::hash_password;
use crate::rate_limit::{CooldownGuard, Flow};
use crate::registration::{PendingRegistration, RegistrationGate};

#[derive(Clone)]
pub struct AccountsState {
    pub db: Database,
    pub registration: RegistrationGate,
    pub cooldowns: CooldownGuard,
    pub mailer: Arc<dyn Mailer>,
    /// Origin the emailed verification link points at.
    pub public_origin: String,
}

pub fn router(state: AccountsState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify/{token}", get(verify))
        .with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct NeutralAck {
    message: &'static str,
}

/// Begin registration. The response is the same whether or not the email is
/// already taken care of downstream; only validation, throttling, and an
/// existing account break the neutral path.
async fn register(
    State(state): State<AccountsState>,
    ClientIp(client): ClientIp,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&payload.name, &payload.email, &payload.password)?;
    let email = normalize_email(&payload.email);

    if state
        .cooldowns
        .is_throttled(Flow::Register, &client, &email)
        .await
        .store_err("Failed to check registration cooldown")?
    {
        return Err(ApiError::Throttled);
    }

    let existing = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .store_err("Failed to look up email")?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with this email already exists."));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::store_error("Failed to hash password", e))?;

    let token = state
        .registration
        .stage(&PendingRegistration {
            name: payload.name.trim().to_string(),
            email: email.clone(),
            password_hash,
        })
        .await
        .store_err("Failed to stage registration")?;

    let link = format!("{}/token/{}", state.public_origin.trim_end_matches('/'), token);
    state
        .mailer
        .send(Mail {
            to: email.clone(),
            subject: "Verify your email address".into(),
            body: format!(
                "Click the link below to verify your account:\n{}\nThis link expires in 5 minutes.",
                link
            ),
        })
        .mail_err("Failed to send verification email")?;

    state
        .cooldowns
        .arm(Flow::Register, &client, &email)
        .await
        .store_err("Failed to arm registration cooldown")?;

    Ok(Json(NeutralAck {
        message: "If your email is valid, a verification link has been sent to your email address. It will expire in 5 minutes.",
    }))
}

#[derive(Serialize)]
struct VerifyResponse {
    message: &'static str,
    user: UserProfile,
}

/// Complete registration. The staged record is consumed before the account
/// is created, so a second attempt with the same token reports expiry.
async fn verify(
    State(state): State<AccountsState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = state
        .registration
        .consume(&token)
        .await
        .store_err("Failed to consume verification token")?
        .ok_or_else(|| ApiError::bad_request("Verification Link is expired"))?;

    // Re-check for a collision: another verification or registration may
    // have landed while this token was pending.
    let existing = state
        .db
        .users()
        .get_by_email(&pending.email)
        .await
        .store_err("Failed to look up email")?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with this email already exists."));
    }

    let uuid = Uuid::new_v4().to_string();
    state
        .db
        .users()
        .create(&uuid, &pending.name, &pending.email, &pending.password_hash)
        .await
        .store_err("Failed to create user")?;

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .store_err("Failed to load created user")?
        .ok_or_else(|| ApiError::internal("Internal server error"))?;

    Ok((
        StatusCode::CREATED,
        Json(VerifyResponse {
            message: "Email verified successfully. Your account has been created.",
            user: UserProfile::from(&user),
        }),
    ))
}
