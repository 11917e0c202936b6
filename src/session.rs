//! Token issuer and session registry.
//!
//! The registry is the authoritative record of the single currently-valid
//! session per account: `active_session:<userId>` points at the live session
//! id, `session:<sessionId>` holds the typed activity record, and
//! `refresh_token:<userId>` holds the bit-exact authoritative copy of the
//! outstanding refresh token. A second login overwrites all three, which is
//! what forcibly logs out the first device on its next activity check.
//!
//! None of the multi-key sequences here are transactional; the store only
//! guarantees per-key atomicity. A crash mid-sequence can orphan a
//! `session:<id>` record, which is unreachable (lookups go through the
//! pointer first) and ages out via TTL.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::csrf::CsrfGuard;
use crate::db::{Database, KvStore, now_unix};
use crate::jwt::{JwtConfig, JwtError, REFRESH_TOKEN_DURATION_SECS, SessionClaims, SignedToken};

/// Server-side session lifetime, matching the refresh token.
pub const SESSION_TTL_SECS: u64 = REFRESH_TOKEN_DURATION_SECS;

/// The authoritative activity record for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_id: String,
    pub created_at: u64,
    pub last_activity: u64,
}

/// Everything minted at login time.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access: SignedToken,
    pub refresh: SignedToken,
    pub session_id: String,
    pub csrf_token: String,
}

/// Errors from session issuance and revocation. Verification paths do not
/// surface these; they fail closed instead.
#[derive(Debug)]
pub enum SessionError {
    Store(sqlx::Error),
    Token(JwtError),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(e) => write!(f, "Store error: {}", e),
            SessionError::Token(e) => write!(f, "Token error: {}", e),
            SessionError::Serialize(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        Self::Token(e)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Token issuer + session registry. Cheap to clone; every handler state
/// carries one.
#[derive(Clone)]
pub struct SessionManager {
    kv: KvStore,
    jwt: Arc<JwtConfig>,
    csrf: CsrfGuard,
}

fn refresh_key(user_uuid: &str) -> String {
    format!("refresh_token:{}", user_uuid)
}

fn active_key(user_uuid: &str) -> String {
    format!("active_session:{}", user_uuid)
}

fn record_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

impl SessionManager {
    pub fn new(db: &Database, jwt: Arc<JwtConfig>) -> Self {
        let kv = db.kv();
        Self {
            csrf: CsrfGuard::new(kv.clone()),
            kv,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    pub fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    /// Mint a full session: token pair, registry records, CSRF token.
    ///
    /// This is the single-session enforcement point: when an active session
    /// already exists for the account, its record is deleted before the new
    /// pointer lands, so the loser of a concurrent login race fails its next
    /// `is_active`/`verify_refresh` check.
    pub async fn issue(&self, user_uuid: &str) -> Result<IssuedSession, SessionError> {
        let session_id = Uuid::new_v4().to_string();

        if let Some(previous) = self.kv.get(&active_key(user_uuid)).await? {
            self.kv.del(&record_key(&previous)).await?;
        }

        let access = self.jwt.generate_access_token(user_uuid, &session_id)?;
        let refresh = self.jwt.generate_refresh_token(user_uuid, &session_id)?;

        self.kv
            .set_ex(&refresh_key(user_uuid), &refresh.token, SESSION_TTL_SECS)
            .await?;
        self.kv
            .set_ex(&active_key(user_uuid), &session_id, SESSION_TTL_SECS)
            .await?;

        let now = now_unix();
        let record = SessionRecord {
            user_id: user_uuid.to_string(),
            session_id: session_id.clone(),
            created_at: now,
            last_activity: now,
        };
        self.kv
            .set_ex(
                &record_key(&session_id),
                &serde_json::to_string(&record)?,
                SESSION_TTL_SECS,
            )
            .await?;

        let csrf_token = self.csrf.issue(user_uuid).await?;

        Ok(IssuedSession {
            access,
            refresh,
            session_id,
            csrf_token,
        })
    }

    /// Re-sign only the access token for an existing session.
    pub fn rotate_access(
        &self,
        user_uuid: &str,
        session_id: &str,
    ) -> Result<SignedToken, SessionError> {
        Ok(self.jwt.generate_access_token(user_uuid, session_id)?)
    }

    /// Verify a presented refresh token against the full chain: signature,
    /// authoritative copy, active-session pointer, live session record.
    ///
    /// Returns the decoded claims on success and `None` on any failure,
    /// including store errors. Callers get no detail; a superseded token and
    /// a lapsed one look identical.
    pub async fn verify_refresh(&self, token: &str) -> Option<SessionClaims> {
        match self.verify_refresh_inner(token).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Refresh verification failed closed");
                None
            }
        }
    }

    async fn verify_refresh_inner(
        &self,
        token: &str,
    ) -> Result<Option<SessionClaims>, SessionError> {
        let Ok(claims) = self.jwt.validate_refresh_token(token) else {
            return Ok(None);
        };

        // Bit-exact match against the stored copy rejects structurally valid
        // tokens from a superseded login.
        let Some(stored) = self.kv.get(&refresh_key(&claims.sub)).await? else {
            return Ok(None);
        };
        if stored != token {
            return Ok(None);
        }

        let Some(active) = self.kv.get(&active_key(&claims.sub)).await? else {
            return Ok(None);
        };
        if active != claims.sid {
            return Ok(None);
        }

        let Some(payload) = self.kv.get(&record_key(&claims.sid)).await? else {
            return Ok(None);
        };
        let mut record: SessionRecord = serde_json::from_str(&payload)?;
        record.last_activity = now_unix();
        self.kv
            .set_ex(
                &record_key(&claims.sid),
                &serde_json::to_string(&record)?,
                SESSION_TTL_SECS,
            )
            .await?;

        Ok(Some(claims))
    }

    /// Whether the given session id is the account's current one.
    /// Missing data reads as inactive.
    pub async fn is_active(&self, user_uuid: &str, session_id: &str) -> Result<bool, sqlx::Error> {
        Ok(self
            .kv
            .get(&active_key(user_uuid))
            .await?
            .is_some_and(|active| active == session_id))
    }

    /// Fetch the activity record for a session id, if still live.
    pub async fn record(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let Some(payload) = self.kv.get(&record_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    /// Tear down all session state for an account: authoritative refresh
    /// token, active-session pointer, the session record it referenced, and
    /// the CSRF token. Idempotent.
    pub async fn revoke(&self, user_uuid: &str) -> Result<(), SessionError> {
        if let Some(session_id) = self.kv.get(&active_key(user_uuid)).await? {
            self.kv.del(&record_key(&session_id)).await?;
        }
        self.kv.del(&refresh_key(user_uuid)).await?;
        self.kv.del(&active_key(user_uuid)).await?;
        self.csrf.revoke(user_uuid).await?;
        Ok(())
    }
}
