// Job definitions handed from request handlers to the pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::tracker::CompletionGuard;
use crate::documents::{PlanSummary, Recipient};

pub type JobId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    Notification(NotificationJob),
    Document(DocumentJob),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Notification(_) => "notification",
            Job::Document(_) => "document",
        }
    }
}

impl From<NotificationJob> for Job {
    fn from(job: NotificationJob) -> Self {
        Job::Notification(job)
    }
}

impl From<DocumentJob> for Job {
    fn from(job: DocumentJob) -> Self {
        Job::Document(job)
    }
}

/// An email to render and send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub to: String,
    pub subject: String,
    /// Template id; `mail` when unset
    pub template: Option<String>,
    pub from: Option<String>,
    pub from_name: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Logical attachment name -> file on disk
    #[serde(default)]
    pub attachments: BTreeMap<String, PathBuf>,
}

impl NotificationJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            template: None,
            from: None,
            from_name: None,
            payload: serde_json::Value::Null,
            attachments: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_sender(mut self, from: impl Into<String>, from_name: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.from_name = Some(from_name.into());
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachments.insert(name.into(), path.into());
        self
    }
}

/// Generate the plan manual for a user, then optionally mail it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJob {
    pub user: Recipient,
    pub plan: PlanSummary,
    /// Sent with the generated file attached once generation succeeds
    pub follow_up: Option<NotificationJob>,
}

impl DocumentJob {
    pub fn new(user: Recipient, plan: PlanSummary) -> Self {
        Self {
            user,
            plan,
            follow_up: None,
        }
    }

    pub fn then_notify(mut self, notification: NotificationJob) -> Self {
        self.follow_up = Some(notification);
        self
    }
}

/// Terminal state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

/// A job in flight, together with its tracker slot
pub(crate) struct Envelope {
    pub id: JobId,
    pub job: Job,
    pub guard: CompletionGuard,
    pub receipt: Option<oneshot::Sender<JobOutcome>>,
}
