use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::dispatcher::{Dispatcher, JobQueue};
use super::errors::{ErrorSink, PipelineError};
use super::jobs::{Job, JobId, JobOutcome};
use super::tracker::CompletionTracker;
use crate::config::PipelineConfig;
use crate::documents::ManualGenerator;
use crate::mail::Mailer;

/// `Running -> Draining -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

/// Lifecycle state shared with every queue handle
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU8::new(PipelineState::Running as u8))
    }

    pub(crate) fn get(&self) -> PipelineState {
        match self.0.load(Ordering::SeqCst) {
            0 => PipelineState::Running,
            1 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }

    fn set(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Everything a worker needs, built once at startup
pub struct PipelineContext {
    pub mailer: Mailer,
    pub documents: ManualGenerator,
    pub errors: ErrorSink,
    pub tracker: Arc<CompletionTracker>,
    pub queue: JobQueue,
    pub(crate) limiter: Option<Arc<Semaphore>>,
}

/// Result of a shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Whether every outstanding job finished before stopping
    pub drained: bool,
    /// Jobs still in flight when the drain timeout elapsed
    pub abandoned: usize,
}

struct Coordinator {
    stop: Option<oneshot::Sender<()>>,
    dispatcher: Option<JoinHandle<()>>,
    report: Option<ShutdownReport>,
}

/// The running job pipeline: queue, dispatcher, tracker and error sink
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    lifecycle: Arc<Lifecycle>,
    drain_timeout: Option<Duration>,
    coordinator: Mutex<Coordinator>,
}

impl Pipeline {
    /// Build the pipeline and spawn its dispatcher on the current runtime
    pub fn start(config: &PipelineConfig, mailer: Mailer, documents: ManualGenerator) -> Self {
        let (errors, error_rx) = ErrorSink::channel();
        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let tracker = CompletionTracker::new();
        let lifecycle = Arc::new(Lifecycle::new());
        let queue = JobQueue::new(job_tx, Arc::clone(&tracker), Arc::clone(&lifecycle));

        let ctx = Arc::new(PipelineContext {
            mailer,
            documents,
            errors,
            tracker,
            queue,
            limiter: config
                .max_concurrent_workers
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
        });

        let dispatcher = Dispatcher::new(job_rx, error_rx, stop_rx, Arc::clone(&ctx));
        let handle = tokio::spawn(dispatcher.run());

        info!(
            queue_capacity = config.queue_capacity,
            max_concurrent_workers = ?config.max_concurrent_workers,
            "Pipeline started"
        );

        Self {
            ctx,
            lifecycle,
            drain_timeout: config.drain_timeout,
            coordinator: Mutex::new(Coordinator {
                stop: Some(stop_tx),
                dispatcher: Some(handle),
                report: None,
            }),
        }
    }

    /// Handle for request handlers to enqueue jobs
    pub fn queue(&self) -> JobQueue {
        self.ctx.queue.clone()
    }

    pub async fn enqueue(&self, job: impl Into<Job>) -> Result<JobId, PipelineError> {
        self.ctx.queue.enqueue(job).await
    }

    pub async fn enqueue_with_receipt(
        &self,
        job: impl Into<Job>,
    ) -> Result<(JobId, oneshot::Receiver<JobOutcome>), PipelineError> {
        self.ctx.queue.enqueue_with_receipt(job).await
    }

    pub fn state(&self) -> PipelineState {
        self.lifecycle.get()
    }

    pub fn outstanding(&self) -> usize {
        self.ctx.tracker.outstanding()
    }

    pub fn succeeded(&self) -> u64 {
        self.ctx.tracker.succeeded()
    }

    pub fn failed(&self) -> u64 {
        self.ctx.tracker.failed()
    }

    pub fn errors_reported(&self) -> u64 {
        self.ctx.errors.reported()
    }

    /// Stop accepting jobs, wait for outstanding work, then stop the
    /// dispatcher and close the queue and error sink.
    ///
    /// Waits indefinitely unless a drain timeout is configured. Calling it
    /// again returns the first report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut coordinator = self.coordinator.lock().await;
        if let Some(report) = coordinator.report {
            return report;
        }

        self.lifecycle.set(PipelineState::Draining);
        info!(outstanding = self.outstanding(), "Draining pipeline");

        let drained = match self.drain_timeout {
            Some(limit) => tokio::time::timeout(limit, self.ctx.tracker.wait_idle())
                .await
                .is_ok(),
            None => {
                self.ctx.tracker.wait_idle().await;
                true
            }
        };

        let abandoned = if drained { 0 } else { self.outstanding() };
        if !drained {
            warn!(abandoned, "Drain timeout elapsed; stopping with jobs in flight");
        }

        if let Some(stop) = coordinator.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = coordinator.dispatcher.take() {
            if let Err(e) = handle.await {
                error!("Dispatcher task failed: {}", e);
            }
        }

        self.lifecycle.set(PipelineState::Stopped);
        let report = ShutdownReport { drained, abandoned };
        coordinator.report = Some(report);

        info!(
            succeeded = self.succeeded(),
            failed = self.failed(),
            "Shutdown complete"
        );
        report
    }
}
