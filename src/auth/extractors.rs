//! Axum extractors for the auth gate.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::Principal;
use crate::db::{Database, KvStore, UserProfile, UserRole};

/// Profile cache lifetime.
pub const PROFILE_CACHE_TTL_SECS: u64 = 3600;

fn profile_key(user_uuid: &str) -> String {
    format!("user:{}", user_uuid)
}

/// Drop the cached profile projection for an account. Called on logout and
/// on account deletion.
pub async fn invalidate_profile(kv: &KvStore, user_uuid: &str) -> Result<(), sqlx::Error> {
    kv.del(&profile_key(user_uuid)).await?;
    Ok(())
}

/// Resolve the principal for an account: profile cache first, then the
/// durable store with a cache fill.
async fn resolve_profile(
    db: &Database,
    user_uuid: &str,
) -> Result<Option<UserProfile>, AuthErrorKind> {
    let kv = db.kv();
    let key = profile_key(user_uuid);

    match kv.get(&key).await {
        Ok(Some(cached)) => {
            // A corrupt cache entry falls through to the durable store
            if let Ok(profile) = serde_json::from_str::<UserProfile>(&cached) {
                return Ok(Some(profile));
            }
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to read profile cache");
            return Err(AuthErrorKind::StoreError);
        }
    }

    let user = db.users().get_by_uuid(user_uuid).await.map_err(|e| {
        error!(error = %e, "Failed to load user");
        AuthErrorKind::StoreError
    })?;
    let Some(user) = user else {
        return Ok(None);
    };

    let profile = UserProfile::from(&user);
    if let Ok(payload) = serde_json::to_string(&profile) {
        if let Err(e) = kv.set_ex(&key, &payload, PROFILE_CACHE_TTL_SECS).await {
            // Cache fill is best effort; the request proceeds
            tracing::warn!(error = %e, "Failed to fill profile cache");
        }
    }
    Ok(Some(profile))
}

/// Core authentication logic: access token to principal, via the session
/// registry. Shared by the `Auth` extractor and the CSRF middleware.
pub async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Principal, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let access_token =
        get_cookie(&parts.headers, ACCESS_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state
        .sessions()
        .jwt()
        .validate_access_token(access_token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    // A structurally valid token for a superseded session is rejected and
    // the device is forcibly logged out.
    let active = state
        .sessions()
        .is_active(&claims.sub, &claims.sid)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to check active session");
            AuthErrorKind::StoreError
        })?;
    if !active {
        return Err(AuthErrorKind::SessionSuperseded);
    }

    let profile = resolve_profile(state.db(), &claims.sub)
        .await?
        .ok_or(AuthErrorKind::UserNotFound)?;

    Ok(Principal {
        user: profile,
        session_id: claims.sid,
    })
}

/// Extractor for endpoints that require an authenticated, currently-active
/// session.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(|kind| ApiAuthError::new(kind, state.secure_cookies()))
    }
}

/// Extractor for admin-gated endpoints. Same as [`Auth`] plus a role check
/// on the resolved principal.
pub struct AdminOnly(pub Principal);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(principal) = Auth::from_request_parts(parts, state).await?;

        if principal.user.role != UserRole::Admin {
            return Err(ApiAuthError::new(
                AuthErrorKind::InsufficientRole,
                state.secure_cookies(),
            ));
        }
        Ok(AdminOnly(principal))
    }
}
