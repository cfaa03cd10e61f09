//! Asynchronous job pipeline
//!
//! ```text
//! request handler ──enqueue──▶ [ bounded FIFO queue ] ──▶ Dispatcher
//!   (tracker +1)                                             │ spawn per job
//!                                                            ▼
//!                                                  Worker (mail / document)
//!                                                   │ failure     │ done
//!                                                   ▼             ▼
//!                                              Error Sink     tracker -1
//!                                                   │             │
//!                                                   └──▶ log      └──▶ shutdown waits for 0
//! ```
//!
//! Enqueueing is fire-and-forget: the caller gets a [`JobId`] back and, if it
//! asked for one, a receipt resolving to the [`JobOutcome`]. Jobs leave the
//! queue in FIFO order; completion order is unspecified. Nothing is retried.

pub mod dispatcher;
pub mod errors;
pub mod jobs;
pub mod pipeline;
pub mod tracker;
pub mod workers;

pub use dispatcher::JobQueue;
pub use errors::{ErrorSink, PipelineError};
pub use jobs::{DocumentJob, Job, JobId, JobOutcome, NotificationJob};
pub use pipeline::{Pipeline, PipelineContext, PipelineState, ShutdownReport};
pub use tracker::{CompletionGuard, CompletionTracker};
pub use workers::MANUAL_ATTACHMENT_NAME;
