use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use super::{MailError, OutboundMessage};
use crate::config::{Encryption, MailConfig};

/// Fixed SMTP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound mail transport
///
/// `connect` and `send` are separate steps so that an unreachable or
/// rejecting server is reported as a connect failure before any message is
/// built. For SMTP this costs a second session per mail: lettre's pool is
/// not enabled, so `connect` opens, authenticates and quits one session and
/// `send` opens another. Mail volume here is a handful of messages per user
/// action, which keeps that cost acceptable.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Open (and authenticate) a connection to check the server is usable
    async fn connect(&self) -> Result<(), MailError>;

    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError>;
}

/// SMTP delivery through lettre
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpTransport {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let builder = match config.encryption {
            Encryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            Encryption::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Connect(e.to_string()))?,
            Encryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Connect(e.to_string()))?,
        };

        let mut builder = builder.port(config.port).timeout(Some(CONNECT_TIMEOUT));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            inner: builder.build(),
            host: config.host.clone(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn connect(&self) -> Result<(), MailError> {
        match self.inner.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::Connect(format!(
                "{} did not accept the connection",
                self.host
            ))),
            Err(e) => Err(MailError::Connect(e.to_string())),
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        let email = build_email(message).await?;
        self.inner
            .send(email)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        debug!(to = %message.to, host = %self.host, "Message accepted by SMTP server");
        Ok(())
    }
}

/// Assemble the MIME message: plain text with an HTML alternative, wrapped
/// in a mixed part when there are attachments.
pub async fn build_email(message: &OutboundMessage) -> Result<Message, MailError> {
    let from = Mailbox::new(
        Some(message.from_name.clone()),
        message
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(message.from.clone()))?,
    );
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|_| MailError::InvalidAddress(message.to.clone()))?;

    let alternative =
        MultiPart::alternative_plain_html(message.plain_body.clone(), message.html_body.clone());

    let body = if message.has_attachments() {
        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in &message.attachments {
            let content = tokio::fs::read(&attachment.path)
                .await
                .map_err(|e| MailError::Attachment {
                    name: attachment.name.clone(),
                    reason: e.to_string(),
                })?;
            let mime = mime_guess::from_path(&attachment.path).first_or_octet_stream();
            let content_type = ContentType::parse(mime.essence_str())
                .map_err(|e| MailError::Build(e.to_string()))?;
            mixed = mixed.singlepart(Attachment::new(attachment.name.clone()).body(content, content_type));
        }
        mixed
    } else {
        alternative
    };

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone())
        .multipart(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::OutboundAttachment;
    use tempfile::TempDir;

    fn message() -> OutboundMessage {
        OutboundMessage {
            from: "info@mycompany.com".to_string(),
            from_name: "Info".to_string(),
            to: "ada@example.com".to_string(),
            subject: "Welcome".to_string(),
            html_body: "<p>Hello</p>".to_string(),
            plain_body: "Hello".to_string(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_build_email_with_alternative_bodies() {
        let email = build_email(&message()).await.unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("Subject: Welcome"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn test_build_email_with_attachment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.pdf");
        std::fs::write(&path, b"%PDF-1.5").unwrap();

        let mut msg = message();
        msg.attachments.push(OutboundAttachment {
            name: "Manual.pdf".to_string(),
            path,
        });

        let raw = String::from_utf8(build_email(&msg).await.unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("Manual.pdf"));
    }

    #[tokio::test]
    async fn test_missing_attachment_fails() {
        let mut msg = message();
        msg.attachments.push(OutboundAttachment {
            name: "Manual.pdf".to_string(),
            path: "/definitely/not/here.pdf".into(),
        });

        let err = build_email(&msg).await.unwrap_err();
        assert!(matches!(err, MailError::Attachment { .. }));
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let mut msg = message();
        msg.to = "not an address".to_string();

        let err = build_email(&msg).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_connect() {
        let config = MailConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..MailConfig::default()
        };
        let transport = SmtpTransport::from_config(&config).unwrap();

        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, MailError::Connect(_)));
    }
}
