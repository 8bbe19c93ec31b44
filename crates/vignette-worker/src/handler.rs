//! Execution of deferred thumbnail jobs

use async_trait::async_trait;
use std::sync::Arc;

use vignette_core::{JobError, RepositoryError, ThumbnailError, ThumbnailJob};
use vignette_processing::ThumbnailServices;
use vignette_repository::ContentRepository;

use crate::context::{JobHandler, JobOutcome};

/// Runs a job against the current state of the repository.
///
/// The job only carries the item reference, so the item is resolved again and the
/// eligibility checks are repeated: it may have been deleted, replaced or changed
/// type since the request that scheduled the job.
pub struct GenerationJobHandler {
    repository: Arc<dyn ContentRepository>,
    services: ThumbnailServices,
}

impl GenerationJobHandler {
    pub fn new(repository: Arc<dyn ContentRepository>, services: ThumbnailServices) -> Self {
        Self {
            repository,
            services,
        }
    }
}

#[async_trait]
impl JobHandler for GenerationJobHandler {
    async fn handle(self: Arc<Self>, job: &ThumbnailJob) -> Result<JobOutcome, JobError> {
        let item = match self.repository.resolve(&job.item).await {
            Ok(item) => item,
            Err(RepositoryError::NotFound(_)) => {
                tracing::info!(item = %job.item, "Item no longer exists, skipping thumbnail job");
                return Ok(JobOutcome::Skipped);
            }
            Err(e) => return Err(ThumbnailError::repository(job.item.to_string(), e).into()),
        };

        let generator = self.services.generator_for(&job.params);
        if !generator.is_enabled() || !generator.can_handle(&item) {
            tracing::debug!(
                path = %item.path,
                kind = generator.kind(),
                "Item no longer eligible for a thumbnail"
            );
            return Ok(JobOutcome::Skipped);
        }

        let generated = generator
            .generate(&item, &job.thumbnail_name, &job.params)
            .await?;

        Ok(if generated {
            JobOutcome::Generated
        } else {
            JobOutcome::Skipped
        })
    }
}
