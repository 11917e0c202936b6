//! HTTP surface: handlers, validation, and the API router.

mod accounts;
mod admin;
pub mod error;
mod login;
mod sessions;
mod validate;

use std::sync::Arc;

use axum::Router;

use crate::db::Database;
use crate::mailer::Mailer;
use crate::otp::OtpGate;
use crate::rate_limit::CooldownGuard;
use crate::registration::RegistrationGate;
use crate::session::SessionManager;

pub use accounts::AccountsState;
pub use admin::AdminState;
pub use login::LoginState;
pub use sessions::SessionApiState;

/// Assemble the API router. Mounted under `/api/v1` by `create_app`.
pub fn create_api_router(
    db: Database,
    session_manager: SessionManager,
    mailer: Arc<dyn Mailer>,
    public_origin: String,
    secure_cookies: bool,
) -> Router {
    let kv = db.kv();

    let accounts = accounts::router(AccountsState {
        db: db.clone(),
        registration: RegistrationGate::new(kv.clone()),
        cooldowns: CooldownGuard::new(kv.clone()),
        mailer: mailer.clone(),
        public_origin,
    });

    let login = login::router(LoginState {
        db: db.clone(),
        sessions: session_manager.clone(),
        otp: OtpGate::new(kv.clone()),
        cooldowns: CooldownGuard::new(kv),
        mailer,
        secure_cookies,
    });

    let session_routes = sessions::router(SessionApiState {
        db: db.clone(),
        sessions: session_manager.clone(),
        secure_cookies,
    });

    let admin = admin::router(AdminState {
        db,
        sessions: session_manager,
        secure_cookies,
    });

    Router::new()
        .merge(accounts)
        .merge(login)
        .merge(session_routes)
        .merge(admin)
}
