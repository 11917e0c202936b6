//! Keyed expiring store: the substrate for every volatile auth record.
//!
//! Pending registrations, OTP codes, throttle markers, refresh tokens,
//! session records, CSRF tokens, and cached user profiles all live here
//! under their own key namespace with a per-key TTL. Expired keys are
//! invisible to readers immediately; the cleanup scheduler purges the
//! rows themselves.

use sqlx::sqlite::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};

/// Store for string keys with per-key expiry.
///
/// Each operation maps to a single statement, so individual gets/sets/deletes
/// are atomic. There are no multi-key transactions; callers must tolerate
/// partially applied sequences (orphans age out via TTL).
#[derive(Clone)]
pub struct KvStore {
    pool: SqlitePool,
}

impl KvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Set a key with a TTL in seconds, overwriting any previous value and
    /// deadline.
    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), sqlx::Error> {
        let expires_at = (now_unix() + ttl_secs) as i64;
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a live value. Returns `None` for missing and expired keys alike.
    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_unix() as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Delete a key. Returns whether a row was removed. Idempotent.
    pub async fn del(&self, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired rows. Called by the cleanup scheduler.
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at <= ?")
            .bind(now_unix() as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Current time as Unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_set_get_del() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        assert_eq!(kv.get("otp:a@x.com").await.unwrap(), None);

        kv.set_ex("otp:a@x.com", "482913", 300).await.unwrap();
        assert_eq!(
            kv.get("otp:a@x.com").await.unwrap(),
            Some("482913".to_string())
        );

        assert!(kv.del("otp:a@x.com").await.unwrap());
        assert_eq!(kv.get("otp:a@x.com").await.unwrap(), None);

        // Idempotent delete
        assert!(!kv.del("otp:a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_deadline() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        kv.set_ex("otp:a@x.com", "111111", 300).await.unwrap();
        kv.set_ex("otp:a@x.com", "222222", 300).await.unwrap();
        assert_eq!(
            kv.get("otp:a@x.com").await.unwrap(),
            Some("222222".to_string())
        );
    }

    #[tokio::test]
    async fn test_expired_key_is_invisible() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        // Insert a row whose deadline is already past
        sqlx::query("INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)")
            .bind("verify:stale")
            .bind("{}")
            .bind(1i64)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(kv.get("verify:stale").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_rows() {
        let db = Database::open(":memory:").await.unwrap();
        let kv = db.kv();

        kv.set_ex("live", "1", 300).await.unwrap();
        sqlx::query("INSERT INTO kv_entries (key, value, expires_at) VALUES ('dead', '1', 1)")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(kv.purge_expired().await.unwrap(), 1);
        assert_eq!(kv.get("live").await.unwrap(), Some("1".to_string()));
    }
}
