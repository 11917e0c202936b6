//! CSRF guard: double-submit token protection for state-changing requests.
//!
//! One token per logged-in account, stored under `csrf:<userId>` so that
//! revocation by account id actually removes the live token. The client
//! reads the token from a non-httpOnly cookie and echoes it back in the
//! `x-csrf-token` header; the server requires both sides to be present and
//! equal, plus a live store entry matching them. The cookie alone never
//! passes: browsers attach cookies to cross-site requests automatically,
//! so only the header proves the page could read the cookie.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::db::KvStore;

/// CSRF token lifetime.
pub const CSRF_TTL_SECS: u64 = 3600;

/// Header the client echoes the cookie value through.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Outcome of checking a presented token against the stored copy.
#[derive(Debug, PartialEq, Eq)]
pub enum CsrfCheck {
    /// Presented token matches the live stored copy.
    Valid,
    /// No live stored token for this account.
    Expired,
    /// A live token exists but the presented one differs.
    Invalid,
}

/// Issues, checks, and revokes per-account CSRF tokens.
#[derive(Clone)]
pub struct CsrfGuard {
    kv: KvStore,
}

impl CsrfGuard {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    fn key(user_uuid: &str) -> String {
        format!("csrf:{}", user_uuid)
    }

    /// Mint and store a fresh token for the account, replacing any live one.
    pub async fn issue(&self, user_uuid: &str) -> Result<String, sqlx::Error> {
        let token = generate_token();
        self.kv
            .set_ex(&Self::key(user_uuid), &token, CSRF_TTL_SECS)
            .await?;
        Ok(token)
    }

    /// Check a presented token against the stored copy.
    pub async fn check(&self, user_uuid: &str, presented: &str) -> Result<CsrfCheck, sqlx::Error> {
        let Some(stored) = self.kv.get(&Self::key(user_uuid)).await? else {
            return Ok(CsrfCheck::Expired);
        };
        if stored != presented {
            return Ok(CsrfCheck::Invalid);
        }
        Ok(CsrfCheck::Valid)
    }

    /// Remove the account's token. Idempotent.
    pub async fn revoke(&self, user_uuid: &str) -> Result<(), sqlx::Error> {
        self.kv.del(&Self::key(user_uuid)).await?;
        Ok(())
    }

    /// Revoke-then-issue.
    pub async fn rotate(&self, user_uuid: &str) -> Result<String, sqlx::Error> {
        self.revoke(user_uuid).await?;
        self.issue(user_uuid).await
    }
}

/// 32 random bytes, url-safe base64.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// CSRF rejection with a machine-readable code so clients can branch:
/// re-fetch the token on `CSRF_TOKEN_EXPIRED`, hard-reload otherwise.
#[derive(Debug)]
pub enum CsrfRejection {
    Missing,
    Expired,
    Invalid,
}

impl CsrfRejection {
    fn code(&self) -> &'static str {
        match self {
            CsrfRejection::Missing => "CSRF_TOKEN_MISSING",
            CsrfRejection::Expired => "CSRF_TOKEN_EXPIRED",
            CsrfRejection::Invalid => "CSRF_TOKEN_INVALID",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            CsrfRejection::Missing => "CSRF token missing. Please refresh the page.",
            CsrfRejection::Expired => "CSRF token expired. Please try again.",
            CsrfRejection::Invalid => "Invalid CSRF token. Please refresh the page.",
        }
    }
}

impl axum::response::IntoResponse for CsrfRejection {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;
        use serde::Serialize;

        #[derive(Serialize)]
        struct CsrfErrorResponse {
            message: &'static str,
            code: &'static str,
        }

        (
            StatusCode::FORBIDDEN,
            Json(CsrfErrorResponse {
                message: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Middleware enforcing the double-submit check on state-changing requests.
///
/// Read-only (`GET`) requests pass untouched. Everything else must carry an
/// authenticated principal plus the token in BOTH the csrf cookie and the
/// `x-csrf-token` header; the two must be equal and must match the live
/// stored copy for that account. A single-sided token fails as missing.
pub async fn verify_csrf<S>(
    axum::extract::State(state): axum::extract::State<S>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response
where
    S: crate::auth::HasAuthBackend + Clone + Send + Sync + 'static,
{
    use axum::http::Method;
    use axum::response::IntoResponse;

    if request.method() == Method::GET {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();

    let principal = match crate::auth::authenticate_request(&parts, &state).await {
        Ok(principal) => principal,
        Err(kind) => {
            return crate::auth::ApiAuthError::new(kind, state.secure_cookies()).into_response();
        }
    };

    let header_token = parts
        .headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok());
    let cookie_token = crate::auth::get_cookie(&parts.headers, crate::auth::CSRF_COOKIE_NAME);
    let (Some(header_token), Some(cookie_token)) = (header_token, cookie_token) else {
        return CsrfRejection::Missing.into_response();
    };
    if header_token != cookie_token {
        return CsrfRejection::Invalid.into_response();
    }

    match state
        .sessions()
        .csrf()
        .check(&principal.user.id, header_token)
        .await
    {
        Ok(CsrfCheck::Valid) => next.run(axum::extract::Request::from_parts(parts, body)).await,
        Ok(CsrfCheck::Expired) => CsrfRejection::Expired.into_response(),
        Ok(CsrfCheck::Invalid) => CsrfRejection::Invalid.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "CSRF verification failed");
            crate::auth::ApiAuthError::new(
                crate::auth::AuthErrorKind::StoreError,
                state.secure_cookies(),
            )
            .into_response()
        }
    }
}
