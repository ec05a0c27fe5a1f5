use async_trait::async_trait;

use crate::ports::{MailMessage, Mailer};

/// Mailer that writes messages to the log instead of sending them. The body
/// is only visible at debug level.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        tracing::info!(
            to = ?message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "Mail not sent: no mail API configured"
        );
        tracing::debug!(to = ?message.to, body = %message.body, "Unsent mail body");
        Ok(())
    }
}
