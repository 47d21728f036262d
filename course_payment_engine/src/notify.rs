//! The notification seam.
//!
//! Mail delivery itself is an external collaborator; the settlement flows only need a primitive that takes a
//! recipient, subject and body and reports success or failure. Backends plug in by implementing [`Notifier`].

use log::info;
use thiserror::Error;

/// A message to be delivered to a platform user or the platform admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to_mail: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(to_mail: S1, subject: S2, body: S3) -> Self {
        Self { to_mail: to_mail.into(), subject: subject.into(), body: body.into() }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Cannot send mail for {recipient}. {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}

#[allow(async_fn_in_trait)]
pub trait Notifier: Clone {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError>;
}

/// A notifier that writes messages to the log and always succeeds. Useful for deployments where the mail
/// relay is handled by an external delivery worker tailing the log, and for local development.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError> {
        info!("📧️ [{}] {}: {}", message.to_mail, message.subject, message.body);
        Ok(())
    }
}
