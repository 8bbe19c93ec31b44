//! Scheduling interfaces

use async_trait::async_trait;
use vignette_core::ThumbnailJob;

/// Accepts jobs for execution after the triggering request.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, job: ThumbnailJob) -> anyhow::Result<()>;
}

/// Executes submitted jobs, at least once each.
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn submit(&self, job: ThumbnailJob) -> anyhow::Result<()>;
}
