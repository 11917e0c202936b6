//! Admin endpoints. All routes require the admin role; the CSRF middleware
//! covers the state-changing ones.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, invalidate_profile};
use crate::csrf::verify_csrf;
use crate::db::{Database, UserProfile};
use crate::impl_has_auth_backend;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub sessions: SessionManager,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", delete(delete_user))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            verify_csrf::<AdminState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
struct DashboardResponse {
    message: String,
    user: UserProfile,
}

async fn dashboard(AdminOnly(principal): AdminOnly) -> impl IntoResponse {
    Json(DashboardResponse {
        message: format!("Welcome to the admin dashboard, {}", principal.user.name),
        user: principal.user,
    })
}

#[derive(Serialize)]
struct UserListResponse {
    users: Vec<UserProfile>,
    count: usize,
}

async fn list_users(
    State(state): State<AdminState>,
    AdminOnly(_): AdminOnly,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .store_err("Failed to list users")?;
    let count = users.len();
    Ok(Json(UserListResponse { users, count }))
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Delete an account and everything hanging off it: live session state,
/// CSRF token, cached profile.
async fn delete_user(
    State(state): State<AdminState>,
    AdminOnly(principal): AdminOnly,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if id == principal.user.id {
        return Err(ApiError::bad_request("You cannot delete your own account."));
    }

    state
        .sessions
        .revoke(&id)
        .await
        .store_err("Failed to revoke sessions for deleted user")?;
    invalidate_profile(&state.db.kv(), &id)
        .await
        .store_err("Failed to invalidate profile cache")?;

    let deleted = state
        .db
        .users()
        .delete(&id)
        .await
        .store_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
