//! Authentication error types.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::clear_all_cookies;

/// Internal auth error kind used by the core authentication logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No access token cookie presented.
    NotAuthenticated,
    /// Access token failed signature or expiry checks; caller should run
    /// the refresh flow.
    InvalidToken,
    /// Another login took over the account's single session slot.
    SessionSuperseded,
    /// Token decoded but no matching durable account.
    UserNotFound,
    /// Authenticated but lacking the required role.
    InsufficientRole,
    /// Backing store unavailable; fails closed.
    StoreError,
}

/// Auth gate rejection: returns JSON, and on supersession also clears all
/// auth cookies so the losing device is visibly logged out.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl ApiAuthError {
    pub fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self.kind {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::SessionSuperseded => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::InvalidToken => StatusCode::BAD_REQUEST,
            AuthErrorKind::UserNotFound => StatusCode::NOT_FOUND,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::StoreError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Please login - no token",
            AuthErrorKind::InvalidToken => "Token expired",
            AuthErrorKind::SessionSuperseded => "Session expired. Please login",
            AuthErrorKind::UserNotFound => "User not found",
            AuthErrorKind::InsufficientRole => "Admin access required",
            AuthErrorKind::StoreError => "Internal server error",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use axum::http::HeaderValue;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            message: &'static str,
        }

        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response();

        // Forced logout: the superseded device must drop its cookies
        if self.kind == AuthErrorKind::SessionSuperseded {
            let headers = response.headers_mut();
            for cookie in clear_all_cookies(self.secure_cookies) {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        response
    }
}
