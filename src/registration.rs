//! Registration gate: stages not-yet-persisted accounts behind an emailed
//! verification token.
//!
//! The staged record holds the password hash, never the password. Consuming
//! a token deletes the record before the account is created, so a token is
//! single-use even when account creation subsequently fails.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::db::KvStore;

/// Staged registration lifetime.
pub const PENDING_TTL_SECS: u64 = 300;

/// A staged, not-yet-persisted account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Stages and consumes pending registrations keyed by verification token.
#[derive(Clone)]
pub struct RegistrationGate {
    kv: KvStore,
}

/// Errors from staging or consuming a registration.
#[derive(Debug)]
pub enum RegistrationError {
    Store(sqlx::Error),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::Store(e) => write!(f, "Store error: {}", e),
            RegistrationError::Serialize(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for RegistrationError {}

impl From<sqlx::Error> for RegistrationError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e)
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

impl RegistrationGate {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    fn key(token: &str) -> String {
        format!("verify:{}", token)
    }

    /// Stage a registration and return the verification token to email.
    pub async fn stage(&self, pending: &PendingRegistration) -> Result<String, RegistrationError> {
        let token = generate_token();
        let payload = serde_json::to_string(pending)?;
        self.kv
            .set_ex(&Self::key(&token), &payload, PENDING_TTL_SECS)
            .await?;
        Ok(token)
    }

    /// Consume a verification token: read the staged record and delete it.
    /// Returns `None` when the token is unknown, lapsed, or already used.
    pub async fn consume(
        &self,
        token: &str,
    ) -> Result<Option<PendingRegistration>, RegistrationError> {
        let key = Self::key(token);
        let Some(payload) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        // Delete before acting on the payload: single-use even if the
        // caller's account creation fails afterwards.
        self.kv.del(&key).await?;
        Ok(Some(serde_json::from_str(&payload)?))
    }
}

/// 32 random bytes, url-safe base64. Goes into an emailed link.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn pending() -> PendingRegistration {
        PendingRegistration {
            name: "Ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_stage_and_consume() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = RegistrationGate::new(db.kv());

        let token = gate.stage(&pending()).await.unwrap();
        let record = gate.consume(&token).await.unwrap().unwrap();
        assert_eq!(record.email, "ann@x.com");
        assert_eq!(record.password_hash, "$argon2id$stub");
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = RegistrationGate::new(db.kv());

        let token = gate.stage(&pending()).await.unwrap();
        assert!(gate.consume(&token).await.unwrap().is_some());
        assert!(gate.consume(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = RegistrationGate::new(db.kv());

        assert!(gate.consume("no-such-token").await.unwrap().is_none());
    }
}
