use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::jobs::JobOutcome;

/// Counts jobs that have been handed to the pipeline but have not reached a
/// terminal state. Shutdown waits for it to reach zero.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    outstanding: AtomicUsize,
    succeeded: AtomicU64,
    failed: AtomicU64,
    idle: Notify,
}

impl CompletionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve a slot before a job is handed over. The slot is released
    /// when the returned guard is dropped.
    pub fn track(self: &Arc<Self>) -> CompletionGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        CompletionGuard {
            tracker: Arc::clone(self),
            outcome: None,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Resolves once no job is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn release(&self, outcome: Option<JobOutcome>) {
        match outcome {
            Some(JobOutcome::Succeeded) => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Some(JobOutcome::Failed) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            None => {}
        }

        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// One outstanding job. Dropping the guard releases the slot exactly once.
#[derive(Debug)]
pub struct CompletionGuard {
    tracker: Arc<CompletionTracker>,
    outcome: Option<JobOutcome>,
}

impl CompletionGuard {
    /// Record the terminal outcome and release the slot
    pub fn finish(mut self, outcome: JobOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.outcome.take());
    }
}
