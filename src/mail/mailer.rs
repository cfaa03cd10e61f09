use std::sync::Arc;
use tracing::{debug, info};

use super::{
    MailError, MailTransport, OutboundAttachment, OutboundMessage, SmtpTransport, TemplateRenderer,
    DEFAULT_TEMPLATE,
};
use crate::config::MailConfig;
use crate::queue::NotificationJob;

/// Renders notifications and hands them to the transport
#[derive(Clone)]
pub struct Mailer {
    config: MailConfig,
    templates: TemplateRenderer,
    transport: Arc<dyn MailTransport>,
}

impl Mailer {
    pub fn new(config: MailConfig, transport: Arc<dyn MailTransport>) -> Self {
        let templates = TemplateRenderer::new(&config.template_dir);
        Self {
            config,
            templates,
            transport,
        }
    }

    /// Mailer delivering over SMTP as configured
    pub fn smtp(config: MailConfig) -> Result<Self, MailError> {
        let transport = SmtpTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Apply sender defaults and render both bodies. Nothing is sent.
    pub async fn compose(&self, job: NotificationJob) -> Result<OutboundMessage, MailError> {
        let template = job
            .template
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());

        let html_body = self.templates.render_html(&template, &job.payload).await?;
        let plain_body = self.templates.render_plain(&template, &job.payload).await?;

        Ok(OutboundMessage {
            from: job
                .from
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| self.config.from_address.clone()),
            from_name: job
                .from_name
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| self.config.from_name.clone()),
            to: job.to,
            subject: job.subject,
            html_body,
            plain_body,
            attachments: job
                .attachments
                .into_iter()
                .map(|(name, path)| OutboundAttachment { name, path })
                .collect(),
        })
    }

    /// Render, connect, send. Any failure ends delivery; there is no retry.
    pub async fn deliver(&self, job: NotificationJob) -> Result<(), MailError> {
        let message = self.compose(job).await?;
        debug!(to = %message.to, subject = %message.subject, "Message rendered");

        self.transport.connect().await?;
        self.transport.send(&message).await?;

        info!(
            to = %message.to,
            attachments = message.attachments.len(),
            "Mail sent"
        );
        Ok(())
    }
}
