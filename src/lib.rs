pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod csrf;
pub mod db;
pub mod jwt;
pub mod mailer;
pub mod otp;
pub mod password;
pub mod rate_limit;
pub mod registration;
pub mod session;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use mailer::Mailer;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Public origin the frontend is served from; emailed links point here
    pub public_origin: Url,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Outbound mail delivery
    pub mailer: Arc<dyn Mailer>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let sessions = SessionManager::new(&config.db, jwt);

    let api_router = create_api_router(
        config.db.clone(),
        sessions,
        config.mailer.clone(),
        config.public_origin.as_str().trim_end_matches('/').to_string(),
        config.secure_cookies,
    );

    Router::new().nest("/api/v1", api_router)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
