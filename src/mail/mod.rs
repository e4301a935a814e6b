/*!
 * Outbound mail
 * A broadcast is one message delivered to many hidden (Bcc) recipients
 */
pub mod transports;

pub use self::transports::{LogTransport, MailTransport, SmtpTransport, TestTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("message has no body")]
    EmptyBody,
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Lowercase, trim, drop blanks and duplicates; first occurrence order is kept.
pub fn dedupe_recipients<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    emails
        .into_iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .collect()
}
