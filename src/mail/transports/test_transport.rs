use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::mail::{Broadcast, MailError, MailTransport};

/// Records broadcasts instead of sending them. Optionally fails every send.
#[derive(Clone, Default)]
pub struct TestTransport {
    pub sent: Arc<Mutex<Vec<Broadcast>>>,
    fail: bool,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Broadcast> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for TestTransport {
    async fn send(&self, broadcast: &Broadcast) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("test transport configured to fail".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(broadcast.clone());
        }
        Ok(())
    }
}
