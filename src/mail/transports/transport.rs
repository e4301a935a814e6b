use async_trait::async_trait;

use crate::mail::{Broadcast, MailError};

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message to every recipient. Any failure aborts the whole send.
    async fn send(&self, broadcast: &Broadcast) -> Result<(), MailError>;
}
