use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
};

use crate::notify::{MailMessage, Notifier, NotifyError};

/// A notifier that records every message it is asked to send. Call [`MemoryNotifier::fail_next`] to make the
/// next send fail, for exercising the post-commit notification failure paths.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    fail_next: Arc<AtomicBool>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Notifier for MemoryNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), NotifyError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(NotifyError { recipient: message.to_mail, reason: "mail relay unavailable".into() });
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
