//! Session lifecycle endpoints: access-token refresh, CSRF rotation,
//! logout, current-user lookup.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, CSRF_COOKIE_NAME, REFRESH_COOKIE_NAME, build_cookie,
    clear_all_cookies, get_cookie, invalidate_profile,
};
use crate::csrf::{CSRF_TTL_SECS, verify_csrf};
use crate::db::{Database, UserProfile};
use crate::impl_has_auth_backend;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct SessionApiState {
    pub db: Database,
    pub sessions: SessionManager,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(SessionApiState);

pub fn router(state: SessionApiState) -> Router {
    Router::new()
        .route(
            "/logout",
            get(logout).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                verify_csrf::<SessionApiState>,
            )),
        )
        .route("/refresh/token", get(refresh_token))
        .route("/refresh/csrf", post(refresh_csrf))
        .route("/me", get(me))
        .with_state(state)
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Exchange a live refresh token for a fresh access token. Every failure
/// mode looks the same to the client: 401 plus cleared cookies, so the next
/// stop is the login page.
async fn refresh_token(
    State(state): State<SessionApiState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let refresh = get_cookie(&headers, REFRESH_COOKIE_NAME);

    let rotated = match refresh {
        Some(token) => match state.sessions.verify_refresh(token).await {
            Some(claims) => state.sessions.rotate_access(&claims.sub, &claims.sid).ok(),
            None => None,
        },
        None => None,
    };

    match rotated {
        Some(access) => (
            AppendHeaders([(
                SET_COOKIE,
                build_cookie(
                    ACCESS_COOKIE_NAME,
                    &access.token,
                    access.duration,
                    true,
                    state.secure_cookies,
                ),
            )]),
            Json(MessageResponse {
                message: "Token refreshed",
            }),
        )
            .into_response(),
        None => {
            let [a, r, c] = clear_all_cookies(state.secure_cookies);
            (
                axum::http::StatusCode::UNAUTHORIZED,
                AppendHeaders([(SET_COOKIE, a), (SET_COOKIE, r), (SET_COOKIE, c)]),
                Json(MessageResponse {
                    message: "Session expired. Please login",
                }),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
struct CsrfRefreshResponse {
    message: &'static str,
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

/// Rotate the CSRF token for the authenticated account. Deliberately outside
/// the CSRF middleware: a client whose token lapsed mid-session must be able
/// to recover without logging in again.
async fn refresh_csrf(
    State(state): State<SessionApiState>,
    Auth(principal): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .sessions
        .csrf()
        .rotate(&principal.user.id)
        .await
        .store_err("Failed to rotate CSRF token")?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            build_cookie(
                CSRF_COOKIE_NAME,
                &token,
                CSRF_TTL_SECS,
                false,
                state.secure_cookies,
            ),
        )]),
        Json(CsrfRefreshResponse {
            message: "CSRF token refreshed",
            csrf_token: token,
        }),
    ))
}

/// Tear down the account's session state and clear the cookies.
async fn logout(
    State(state): State<SessionApiState>,
    Auth(principal): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .revoke(&principal.user.id)
        .await
        .store_err("Failed to revoke session")?;
    invalidate_profile(&state.db.kv(), &principal.user.id)
        .await
        .store_err("Failed to invalidate profile cache")?;

    let [a, r, c] = clear_all_cookies(state.secure_cookies);
    Ok((
        AppendHeaders([(SET_COOKIE, a), (SET_COOKIE, r), (SET_COOKIE, c)]),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    ))
}

#[derive(Serialize)]
struct ActivityInfo {
    #[serde(rename = "loginTime")]
    login_time: u64,
    #[serde(rename = "lastActivity")]
    last_activity: u64,
}

#[derive(Serialize)]
struct MeResponse {
    user: UserProfile,
    #[serde(rename = "sessionInfo")]
    session_info: Option<ActivityInfo>,
}

/// The authenticated account's profile plus session activity timestamps.
async fn me(
    State(state): State<SessionApiState>,
    Auth(principal): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .sessions
        .record(&principal.session_id)
        .await
        .store_err("Failed to load session record")?;

    Ok(Json(MeResponse {
        user: principal.user,
        session_info: record.map(|r| ActivityInfo {
            login_time: r.created_at,
            last_activity: r.last_activity,
        }),
    }))
}
