use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A fully rendered message, ready for the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub plain_body: String,
    #[serde(default)]
    pub attachments: Vec<OutboundAttachment>,
}

/// A file attached under a logical name (the name the recipient sees)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAttachment {
    pub name: String,
    pub path: PathBuf,
}

impl OutboundMessage {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}
