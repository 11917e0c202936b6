//! Outbound mail delivery boundary.
//!
//! Delivery itself is an external concern; the service only composes
//! messages (verification links, OTP codes) and hands them to a [`Mailer`].
//! Production deployments plug in a real transport; tests use
//! [`RecordingMailer`] to read the token or code back out.

use std::sync::Mutex;
use tracing::info;

/// An outbound message.
#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Errors from mail delivery.
#[derive(Debug)]
pub struct MailError(pub String);

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mail delivery failed: {}", self.0)
    }
}

impl std::error::Error for MailError {}

/// Mail delivery interface. Implementations must be cheap to call from
/// request handlers; slow transports should enqueue internally.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Mailer that logs the message instead of delivering it.
/// Default for local development.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: Mail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "Outbound mail (log only)");
        Ok(())
    }
}

/// Mailer that records every message for tests to inspect.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent message sent to the given address.
    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: Mail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}
