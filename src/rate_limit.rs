//! Cooldown guard for sensitive unauthenticated endpoints.
//!
//! Keyed by (client, identity) pair in the expiring store: once an attempt
//! completes, further attempts for the same pair are rejected until the
//! marker lapses. Unlike an in-process token bucket this survives restarts
//! and is shared across replicas pointing at the same store.

use crate::db::KvStore;

/// Cooldown window after a completed attempt.
pub const COOLDOWN_SECS: u64 = 60;

/// Which flow the cooldown protects. Keys are namespaced per flow so a
/// registration attempt does not throttle a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Register,
    Login,
}

impl Flow {
    fn as_str(&self) -> &'static str {
        match self {
            Flow::Register => "register",
            Flow::Login => "login",
        }
    }
}

/// Store-backed cooldown guard.
#[derive(Clone)]
pub struct CooldownGuard {
    kv: KvStore,
}

impl CooldownGuard {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    // The identity segment is normalized by the caller; mixed-case emails
    // must map to one key or the cooldown can be bypassed.
    fn key(flow: Flow, client: &str, identity: &str) -> String {
        format!("{}-rate-limit-{}:{}", flow.as_str(), client, identity)
    }

    /// Whether the (client, identity) pair is inside its cooldown window.
    pub async fn is_throttled(
        &self,
        flow: Flow,
        client: &str,
        identity: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(self.kv.get(&Self::key(flow, client, identity)).await?.is_some())
    }

    /// Arm the cooldown after an attempt completes.
    pub async fn arm(&self, flow: Flow, client: &str, identity: &str) -> Result<(), sqlx::Error> {
        self.kv
            .set_ex(&Self::key(flow, client, identity), "true", COOLDOWN_SECS)
            .await
    }
}
