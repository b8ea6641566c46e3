//! Outbound mail. Delivery is best-effort: failures are logged, never
//! returned to the workflow that triggered the send.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "outbound mail"
        );
        Ok(())
    }
}

/// Drops every mail. Used when mail is disabled.
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, email: &Email) -> Result<(), MailError> {
        debug!(to = %email.to, "mail disabled, dropping");
        Ok(())
    }
}

/// Fire-and-forget delivery. Inside a tokio runtime the send runs on the
/// blocking pool; elsewhere it runs inline. Either way errors are only logged.
pub fn send_in_background(mailer: Arc<dyn Mailer>, email: Email) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || deliver(mailer.as_ref(), &email));
        }
        Err(_) => deliver(mailer.as_ref(), &email),
    }
}

fn deliver(mailer: &dyn Mailer, email: &Email) {
    if let Err(e) = mailer.send(email) {
        warn!(to = %email.to, "{}", e);
    }
}
