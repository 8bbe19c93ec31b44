//! Job handler trait
//!
//! The queue holds a weak reference to its handler and calls `handle` for every
//! attempt of a job.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};

use vignette_core::{JobError, ThumbnailJob};

/// What a successful job run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// A thumbnail was written.
    Generated,
    /// Nothing to do: the item is gone, no longer eligible, or cannot be converted.
    Skipped,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Generated => write!(f, "generated"),
            JobOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one attempt of `job`.
    async fn handle(self: Arc<Self>, job: &ThumbnailJob) -> Result<JobOutcome, JobError>;
}

/// Placeholder handler used when no real handler exists yet (e.g. during init).
/// Every attempt fails without retry.
struct NoopHandler;

#[async_trait]
impl JobHandler for NoopHandler {
    async fn handle(self: Arc<Self>, _job: &ThumbnailJob) -> Result<JobOutcome, JobError> {
        Err(JobError::unrecoverable(anyhow::anyhow!(
            "NoopHandler: no job handler available"
        )))
    }
}

/// Returns a weak reference to a no-op handler. Its target is already dropped, so a
/// queue built with it reports every job as failed.
pub fn empty_handler_weak() -> Weak<dyn JobHandler> {
    let handler: Arc<dyn JobHandler> = Arc::new(NoopHandler);
    Arc::downgrade(&handler)
}
