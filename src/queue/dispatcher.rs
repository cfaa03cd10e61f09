use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::PipelineError;
use super::jobs::{Envelope, Job, JobId, JobOutcome};
use super::pipeline::{Lifecycle, PipelineContext, PipelineState};
use super::tracker::CompletionTracker;
use super::workers::Worker;

/// Producer side of the bounded job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Envelope>,
    tracker: Arc<CompletionTracker>,
    lifecycle: Arc<Lifecycle>,
}

impl JobQueue {
    pub(crate) fn new(
        tx: mpsc::Sender<Envelope>,
        tracker: Arc<CompletionTracker>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            tx,
            tracker,
            lifecycle,
        }
    }

    /// Hand a job to the pipeline and return without waiting for it to run.
    /// Waits for room when the queue is full.
    pub async fn enqueue(&self, job: impl Into<Job>) -> Result<JobId, PipelineError> {
        self.submit(job.into(), None, false).await
    }

    /// Like [`enqueue`](Self::enqueue), with a receiver resolving to the
    /// job's terminal outcome
    pub async fn enqueue_with_receipt(
        &self,
        job: impl Into<Job>,
    ) -> Result<(JobId, oneshot::Receiver<JobOutcome>), PipelineError> {
        let (tx, rx) = oneshot::channel();
        let id = self.submit(job.into(), Some(tx), false).await?;
        Ok((id, rx))
    }

    /// Follow-up work issued by a running job. Accepted while draining,
    /// because the parent job still holds its tracker slot.
    pub(crate) async fn enqueue_follow_up(&self, job: impl Into<Job>) -> Result<JobId, PipelineError> {
        self.submit(job.into(), None, true).await
    }

    async fn submit(
        &self,
        job: Job,
        receipt: Option<oneshot::Sender<JobOutcome>>,
        follow_up: bool,
    ) -> Result<JobId, PipelineError> {
        // Reserve the slot before checking state so a concurrent drain
        // either sees this job or this call sees the drain
        let guard = self.tracker.track();

        let state = self.lifecycle.get();
        let accepting = match state {
            PipelineState::Running => true,
            PipelineState::Draining => follow_up,
            PipelineState::Stopped => false,
        };
        if !accepting {
            warn!(kind = job.kind(), ?state, "Rejected job; pipeline is closed");
            return Err(PipelineError::PipelineClosed);
        }

        let id = Uuid::new_v4();
        let kind = job.kind();
        self.tx
            .send(Envelope {
                id,
                job,
                guard,
                receipt,
            })
            .await
            .map_err(|_| PipelineError::PipelineClosed)?;

        debug!(job_id = %id, kind, "Job enqueued");
        Ok(id)
    }
}

/// Pulls jobs off the queue in FIFO order and spawns one worker per job.
/// Also drains the error sink into the log.
pub(crate) struct Dispatcher {
    jobs: mpsc::Receiver<Envelope>,
    errors: mpsc::UnboundedReceiver<PipelineError>,
    stop: oneshot::Receiver<()>,
    ctx: Arc<PipelineContext>,
}

impl Dispatcher {
    pub(crate) fn new(
        jobs: mpsc::Receiver<Envelope>,
        errors: mpsc::UnboundedReceiver<PipelineError>,
        stop: oneshot::Receiver<()>,
        ctx: Arc<PipelineContext>,
    ) -> Self {
        Self {
            jobs,
            errors,
            stop,
            ctx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;

                Some(err) = self.errors.recv() => log_error(&err),
                _ = &mut self.stop => break,
                Some(envelope) = self.jobs.recv() => self.dispatch(envelope),
                else => break,
            }
        }

        // Close both channels; anything still queued here was abandoned by a
        // drain timeout
        self.jobs.close();
        let mut discarded = 0usize;
        while let Ok(envelope) = self.jobs.try_recv() {
            warn!(job_id = %envelope.id, kind = envelope.job.kind(), "Discarding queued job");
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Dispatcher stopped with queued jobs");
        }

        self.errors.close();
        while let Ok(err) = self.errors.try_recv() {
            log_error(&err);
        }

        info!("Dispatcher stopped");
    }

    fn dispatch(&self, envelope: Envelope) {
        debug!(job_id = %envelope.id, kind = envelope.job.kind(), "Dispatching job");
        let worker = Worker::new(Arc::clone(&self.ctx));
        tokio::spawn(worker.process(envelope));
    }
}

fn log_error(err: &PipelineError) {
    error!(error = %err, "Pipeline job failed");
}
