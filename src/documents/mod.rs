//! Per-user document generation
//!
//! Produces the personalised plan manual that is mailed after a subscription.
//! Generation is slow (it loads and rewrites a PDF) and always runs inside a
//! pipeline worker, never on the request path.

pub mod manual;

pub use manual::{ManualGenerator, MANUAL_TEMPLATE_FILE};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("manual template not found at {0}")]
    TemplateMissing(PathBuf),

    #[error("manual template has no pages")]
    EmptyTemplate,

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to write manual: {0}")]
    Write(#[from] std::io::Error),

    #[error("document task failed: {0}")]
    Task(String),
}

/// The user a document is generated for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Recipient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub id: i64,
    pub name: String,
}
