// Worker processing a single job to its terminal state

use std::sync::Arc;
use tracing::{info, warn};

use super::errors::PipelineError;
use super::jobs::{DocumentJob, Envelope, Job, JobId, JobOutcome, NotificationJob};
use super::pipeline::PipelineContext;

/// Attachment name under which the generated manual is mailed
pub const MANUAL_ATTACHMENT_NAME: &str = "Manual.pdf";

pub(crate) struct Worker {
    ctx: Arc<PipelineContext>,
}

impl Worker {
    pub(crate) fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Run the job, report any failure, then release the tracker slot.
    /// Releasing is always the last step.
    pub(crate) async fn process(self, envelope: Envelope) {
        let Envelope {
            id,
            job,
            guard,
            receipt,
        } = envelope;

        // Held for the whole job when concurrency is capped
        let _permit = match &self.ctx.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        info!(job_id = %id, kind = job.kind(), "Processing job");

        let result = match job {
            Job::Notification(job) => self.process_notification_job(id, job).await,
            Job::Document(job) => self.process_document_job(id, job).await,
        };

        let outcome = match result {
            Ok(()) => JobOutcome::Succeeded,
            Err(err) => {
                self.ctx.errors.report(err);
                JobOutcome::Failed
            }
        };

        if let Some(receipt) = receipt {
            let _ = receipt.send(outcome);
        }
        guard.finish(outcome);
    }

    async fn process_notification_job(&self, id: JobId, job: NotificationJob) -> Result<(), PipelineError> {
        let to = job.to.clone();
        self.ctx
            .mailer
            .deliver(job)
            .await
            .map_err(|source| PipelineError::Notification {
                job_id: id,
                to,
                source,
            })
    }

    async fn process_document_job(&self, id: JobId, job: DocumentJob) -> Result<(), PipelineError> {
        let DocumentJob {
            user,
            plan,
            follow_up,
        } = job;

        let path = self
            .ctx
            .documents
            .generate(&user, &plan)
            .await
            .map_err(|source| PipelineError::Document {
                job_id: id,
                user_id: user.id,
                source,
            })?;

        match follow_up {
            Some(notification) => {
                let notification = notification.with_attachment(MANUAL_ATTACHMENT_NAME, path);
                let follow_up_id = self.ctx.queue.enqueue_follow_up(notification).await?;
                info!(job_id = %id, %follow_up_id, "Manual queued for delivery");
            }
            None => warn!(job_id = %id, "Manual generated without a follow-up notification"),
        }
        Ok(())
    }
}
