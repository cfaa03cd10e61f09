use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;
use uuid::Uuid;

use super::jobs::JobId;
use crate::documents::DocumentError;
use crate::mail::MailError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline is closed; no further jobs are accepted")]
    PipelineClosed,

    #[error("notification {job_id} to {to} failed: {source}")]
    Notification {
        job_id: JobId,
        to: String,
        #[source]
        source: MailError,
    },

    #[error("document {job_id} for user {user_id} failed: {source}")]
    Document {
        job_id: JobId,
        user_id: Uuid,
        #[source]
        source: DocumentError,
    },
}

/// Where workers report failures. Reports are drained by the dispatcher
/// into the process log.
#[derive(Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<PipelineError>,
    reported: Arc<AtomicU64>,
}

impl ErrorSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            reported: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    pub fn report(&self, err: PipelineError) {
        self.reported.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(err)) = self.tx.send(err) {
            // Sink already closed by shutdown
            error!(error = %err, "Pipeline error after shutdown");
        }
    }

    /// Number of errors reported so far
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }
}
