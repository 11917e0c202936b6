//! Authentication state traits and macro.

use crate::db::Database;
use crate::session::SessionManager;

/// Trait for state types that provide what the auth gate needs: the durable
/// store, the session registry, and the cookie security flag.
pub trait HasAuthBackend {
    fn sessions(&self) -> &SessionManager;
    fn db(&self) -> &Database;
    fn secure_cookies(&self) -> bool;
}

/// Macro to implement [`HasAuthBackend`] for state structs with the standard
/// fields.
///
/// The struct must have these fields:
/// - `sessions: SessionManager`
/// - `db: Database`
/// - `secure_cookies: bool`
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionManager {
                &self.sessions
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
