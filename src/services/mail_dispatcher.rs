use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ports::{MailMessage, Mailer};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Sends mail on a detached task. Callers never wait on delivery; a message
/// that still fails after the last attempt is only logged.
#[derive(Clone)]
pub struct MailDispatcher {
    mailer: Arc<dyn Mailer>,
    max_attempts: u32,
    backoff: Duration,
}

impl MailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self::with_retry(mailer, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF)
    }

    pub fn with_retry(mailer: Arc<dyn Mailer>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            mailer,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// The handle resolves to `true` once the message was accepted.
    pub fn dispatch(&self, message: MailMessage) -> JoinHandle<bool> {
        let mailer = self.mailer.clone();
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;

        tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                match mailer.send(&message).await {
                    Ok(()) => {
                        tracing::debug!(to = ?message.to, attempt, "Mail delivered");
                        return true;
                    }
                    Err(e) if attempt < max_attempts => {
                        tracing::warn!(to = ?message.to, attempt, error = %e, "Mail delivery failed, retrying");
                        tokio::time::sleep(backoff * 2u32.pow(attempt - 1)).await;
                    }
                    Err(e) => {
                        tracing::error!(to = ?message.to, attempt, error = %e, "Mail delivery failed, giving up");
                    }
                }
            }
            false
        })
    }
}
