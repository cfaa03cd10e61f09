//! Notification delivery
//!
//! A [`NotificationJob`](crate::queue::NotificationJob) is turned into an
//! [`OutboundMessage`] by the [`Mailer`]: sender defaults are applied, the
//! HTML and plain-text bodies are rendered from `<template>.html` and
//! `<template>.plain`, and the result is handed to a [`MailTransport`].
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MAIL_HOST` | `localhost` | SMTP server hostname |
//! | `MAIL_PORT` | `1025` | SMTP port |
//! | `MAIL_USERNAME` / `MAIL_PASSWORD` | unset | SMTP credentials |
//! | `MAIL_ENCRYPTION` | `none` | `none`, `tls` (STARTTLS) or `ssl` (implicit TLS) |
//! | `MAIL_FROM_ADDRESS` / `MAIL_FROM_NAME` | `info@mycompany.com` / `Info` | sender defaults |
//! | `MAIL_TEMPLATE_DIR` | `./templates` | where `<id>.html` / `<id>.plain` live |

pub mod mailer;
pub mod message;
pub mod render;
pub mod transport;

pub use mailer::Mailer;
pub use message::{OutboundAttachment, OutboundMessage};
pub use render::{TemplateRenderer, BODY_SECTION, DEFAULT_TEMPLATE};
pub use transport::{MailTransport, SmtpTransport, CONNECT_TIMEOUT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("template {template} could not be loaded: {reason}")]
    TemplateNotFound { template: String, reason: String },

    #[error("failed to render template {template}: {reason}")]
    Render { template: String, reason: String },

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to read attachment {name}: {reason}")]
    Attachment { name: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP connection failed: {0}")]
    Connect(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

impl MailError {
    /// Whether the failure happened before any transport was involved
    pub fn is_render(&self) -> bool {
        matches!(
            self,
            MailError::TemplateNotFound { .. } | MailError::Render { .. }
        )
    }
}
