// Member Pipeline - background jobs and signed links for a membership site

pub mod config;
pub mod documents;
pub mod links;     // Signed, time-limited URLs
pub mod mail;
pub mod membership;
pub mod queue;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::Config;
pub use queue::{Pipeline, PipelineContext};
