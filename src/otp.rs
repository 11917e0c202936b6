//! One-time passcode gate: the step-up between password verification and
//! session issuance.
//!
//! At most one live code exists per normalized email; issuing a new code
//! overwrites the previous one. Codes are single-use and lapse after five
//! minutes.

use rand::Rng;

use crate::db::KvStore;

/// OTP lifetime.
pub const OTP_TTL_SECS: u64 = 300;

/// Outcome of a verification attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpOutcome {
    /// Code matched and was consumed.
    Valid,
    /// No live code for this email (never issued, lapsed, or already used).
    Expired,
    /// A live code exists but the submitted one differs.
    Mismatch,
}

/// Issues and verifies one-time passcodes keyed by normalized email.
#[derive(Clone)]
pub struct OtpGate {
    kv: KvStore,
}

impl OtpGate {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    fn key(email: &str) -> String {
        format!("otp:{}", email)
    }

    /// Generate and store a fresh 6-digit code for the email, replacing any
    /// live one. The email must already be normalized (trimmed, lowercased).
    pub async fn issue(&self, email: &str) -> Result<String, sqlx::Error> {
        let code = generate_code();
        self.kv.set_ex(&Self::key(email), &code, OTP_TTL_SECS).await?;
        Ok(code)
    }

    /// Verify a submitted code. Exact string comparison; a match consumes
    /// the stored code.
    pub async fn verify(&self, email: &str, code: &str) -> Result<OtpOutcome, sqlx::Error> {
        let key = Self::key(email);
        let Some(stored) = self.kv.get(&key).await? else {
            return Ok(OtpOutcome::Expired);
        };
        if stored != code {
            return Ok(OtpOutcome::Mismatch);
        }
        self.kv.del(&key).await?;
        Ok(OtpOutcome::Valid)
    }
}

/// Uniformly random 6-digit numeric code.
fn generate_code() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_verify_consumes_code() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = OtpGate::new(db.kv());

        let code = gate.issue("ann@x.com").await.unwrap();
        assert_eq!(gate.verify("ann@x.com", &code).await.unwrap(), OtpOutcome::Valid);
        // Single use
        assert_eq!(
            gate.verify("ann@x.com", &code).await.unwrap(),
            OtpOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_wrong_code_does_not_consume() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = OtpGate::new(db.kv());

        let code = gate.issue("ann@x.com").await.unwrap();
        assert_eq!(
            gate.verify("ann@x.com", "000000").await.unwrap(),
            OtpOutcome::Mismatch
        );
        // Still live after a mismatch
        assert_eq!(gate.verify("ann@x.com", &code).await.unwrap(), OtpOutcome::Valid);
    }

    #[tokio::test]
    async fn test_never_issued_is_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = OtpGate::new(db.kv());

        assert_eq!(
            gate.verify("ann@x.com", "123456").await.unwrap(),
            OtpOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_reissue_replaces_code() {
        let db = Database::open(":memory:").await.unwrap();
        let gate = OtpGate::new(db.kv());

        let first = gate.issue("ann@x.com").await.unwrap();
        let second = gate.issue("ann@x.com").await.unwrap();
        if first == second {
            // 1-in-900000 collision; nothing to assert
            return;
        }

        assert_eq!(
            gate.verify("ann@x.com", &first).await.unwrap(),
            OtpOutcome::Mismatch
        );
        assert_eq!(
            gate.verify("ann@x.com", &second).await.unwrap(),
            OtpOutcome::Valid
        );
    }
}
