//! Request-time auth gate.
//!
//! Resolves the access-token cookie into a principal, consults the session
//! registry so that a superseded session is rejected the moment another
//! device completes a login, and caches the account projection in the
//! expiring store.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CSRF_COOKIE_NAME, REFRESH_COOKIE_NAME, build_cookie, clear_all_cookies,
    clear_cookie, get_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminOnly, Auth, PROFILE_CACHE_TTL_SECS, authenticate_request, invalidate_profile,
};
pub use ip::{ClientIp, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::Principal;
