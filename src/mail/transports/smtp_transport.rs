use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::mail::{Broadcast, MailError, MailTransport};

#[derive(Clone)]
pub struct SmtpTransport {
    from: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            from: from.to_string(),
            transport: builder.build(),
        })
    }
}

/// The sender is the only visible recipient; everyone else goes in Bcc.
pub fn build_message(from: &str, broadcast: &Broadcast) -> Result<Message, MailError> {
    let from: Mailbox = from.parse()?;

    let mut builder = Message::builder()
        .from(from.clone())
        .to(from)
        .subject(broadcast.subject.clone());

    for recipient in &broadcast.recipients {
        builder = builder.bcc(recipient.parse()?);
    }

    let message = match (&broadcast.html, &broadcast.text) {
        (Some(html), Some(text)) => {
            builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))?
        }
        (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
        (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
        (None, None) => return Err(MailError::EmptyBody),
    };

    Ok(message)
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, broadcast: &Broadcast) -> Result<(), MailError> {
        let message = build_message(&self.from, broadcast)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}
