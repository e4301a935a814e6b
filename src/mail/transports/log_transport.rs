use async_trait::async_trait;

use crate::mail::{Broadcast, MailError, MailTransport};

/// Used when no SMTP server is configured: the broadcast is only logged.
#[derive(Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, broadcast: &Broadcast) -> Result<(), MailError> {
        tracing::warn!(
            subject = %broadcast.subject,
            recipients = broadcast.recipients.len(),
            "SMTP not configured; newsletter broadcast logged but not delivered"
        );
        Ok(())
    }
}
