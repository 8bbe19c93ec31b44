//! Entry point for content events asking for a thumbnail

use std::fmt;
use std::sync::Arc;

use vignette_core::{GenerationParams, SourceItem, ThumbnailError, ThumbnailJob};
use vignette_processing::{ThumbnailGenerator, ThumbnailServices};

use crate::scheduler::Scheduler;

/// Where a generation request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Right away, within the triggering request.
    Inline,
    /// As a job, after the triggering request.
    Deferred,
}

/// What happened to a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The service is disabled or the item is not eligible.
    Skipped,
    /// Ran inline; `true` if a thumbnail was written.
    Generated(bool),
    /// Handed to the scheduler.
    Scheduled,
    /// Ran inline or scheduling failed; the error has been logged.
    Failed,
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Skipped => write!(f, "skipped"),
            RequestOutcome::Generated(true) => write!(f, "generated"),
            RequestOutcome::Generated(false) => write!(f, "not generated"),
            RequestOutcome::Scheduled => write!(f, "scheduled"),
            RequestOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Decides, per request, whether to generate inline or schedule a job.
///
/// Never returns an error: a failing thumbnail must not fail the content operation
/// that triggered it.
#[derive(Clone)]
pub struct ThumbnailCoordinator {
    services: ThumbnailServices,
    scheduler: Arc<dyn Scheduler>,
    mode_override: Option<ExecutionMode>,
}

impl ThumbnailCoordinator {
    pub fn new(services: ThumbnailServices, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            services,
            scheduler,
            mode_override: None,
        }
    }

    /// Ignore the services' background job settings.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode_override = Some(mode);
        self
    }

    pub fn execution_mode(&self, generator: &dyn ThumbnailGenerator) -> ExecutionMode {
        match self.mode_override {
            Some(mode) => mode,
            None if generator.use_background_job() => ExecutionMode::Deferred,
            None => ExecutionMode::Inline,
        }
    }

    pub async fn request_thumbnail(
        &self,
        item: &SourceItem,
        name: &str,
        params: GenerationParams,
    ) -> RequestOutcome {
        let generator = self.services.generator_for(&params);

        if !generator.is_enabled() || !generator.can_handle(item) {
            tracing::debug!(
                path = %item.path,
                kind = generator.kind(),
                "No thumbnail for item"
            );
            return RequestOutcome::Skipped;
        }

        match self.execution_mode(generator.as_ref()) {
            ExecutionMode::Inline => {
                match Self::generate_inline(generator, item, name, params).await {
                    Ok(created) => RequestOutcome::Generated(created),
                    Err(e) => {
                        tracing::error!(
                            path = %item.path,
                            thumbnail = %name,
                            error = %e,
                            "Error creating thumbnail"
                        );
                        RequestOutcome::Failed
                    }
                }
            }
            ExecutionMode::Deferred => {
                let job = ThumbnailJob::new(item.reference.clone(), &item.name, name, params);
                tracing::info!(job_id = %job.id, job = %job.display_name, "Scheduling thumbnail job");

                match self.scheduler.schedule(job).await {
                    Ok(()) => RequestOutcome::Scheduled,
                    Err(e) => {
                        tracing::error!(
                            path = %item.path,
                            thumbnail = %name,
                            error = %e,
                            "Error scheduling thumbnail job"
                        );
                        RequestOutcome::Failed
                    }
                }
            }
        }
    }

    /// Run the generator on its own task so that a panic in a conversion engine ends
    /// up as [`ThumbnailError::Unexpected`] instead of unwinding into the caller.
    async fn generate_inline(
        generator: Arc<dyn ThumbnailGenerator>,
        item: &SourceItem,
        name: &str,
        params: GenerationParams,
    ) -> Result<bool, ThumbnailError> {
        let task_item = item.clone();
        let task_name = name.to_string();
        tokio::spawn(async move { generator.generate(&task_item, &task_name, &params).await })
            .await
            .unwrap_or_else(|e| Err(ThumbnailError::unexpected(&item.path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_scope::EndOfRequestScheduler;
    use crate::scheduler::JobSink;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vignette_core::{ItemRef, ThumbnailDimensions, VignetteConfig};
    use vignette_processing::test_helpers::{
        corrupt_pdf, sample_pdf, sample_video, FakeFrameExtractor, FakePdfRenderer,
    };
    use vignette_processing::Converters;
    use vignette_repository::{ContentRepository, InMemoryRepository};

    #[derive(Default)]
    struct CollectingSink {
        jobs: Mutex<Vec<ThumbnailJob>>,
    }

    #[async_trait]
    impl JobSink for CollectingSink {
        async fn submit(&self, job: ThumbnailJob) -> anyhow::Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    struct FailingScheduler;

    #[async_trait]
    impl Scheduler for FailingScheduler {
        async fn schedule(&self, _job: ThumbnailJob) -> anyhow::Result<()> {
            anyhow::bail!("scheduler unavailable")
        }
    }

    fn services(repo: &InMemoryRepository, config: &VignetteConfig) -> ThumbnailServices {
        let repository: Arc<dyn ContentRepository> = Arc::new(repo.clone());
        ThumbnailServices::with_converters(
            config,
            repository,
            Converters {
                document: None,
                renderer: Some(Arc::new(FakePdfRenderer::new(1, 612, 792))),
                extractor: Some(Arc::new(FakeFrameExtractor::new(30, 640, 480))),
            },
        )
    }

    fn pdf_item(repo: &InMemoryRepository) -> SourceItem {
        repo.insert_file(
            ItemRef::new("pdf-1", "default"),
            "/files/report.pdf",
            Some("application/pdf"),
            sample_pdf(),
        )
    }

    const DOCUMENT: GenerationParams = GenerationParams::Document { size: 150 };

    #[tokio::test]
    async fn test_background_setting_defers() {
        let repo = InMemoryRepository::new();
        let item = pdf_item(&repo);
        let sink = Arc::new(CollectingSink::default());
        let scope = Arc::new(EndOfRequestScheduler::new(sink.clone()));
        let coordinator =
            ThumbnailCoordinator::new(services(&repo, &VignetteConfig::default()), scope.clone());

        let outcome = coordinator.request_thumbnail(&item, "thumbnail", DOCUMENT).await;
        assert_eq!(outcome, RequestOutcome::Scheduled);
        assert_eq!(repo.child_count(&item.reference), 0);

        scope.complete().await;
        let jobs = sink.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].item, item.reference);
        assert_eq!(jobs[0].display_name, "Document thumbnail for report.pdf");
    }

    #[tokio::test]
    async fn test_inline_generation() {
        let repo = InMemoryRepository::new();
        let item = pdf_item(&repo);
        let mut config = VignetteConfig::default();
        config.document.use_background_job = false;
        let coordinator = ThumbnailCoordinator::new(
            services(&repo, &config),
            Arc::new(EndOfRequestScheduler::new(Arc::new(CollectingSink::default()))),
        );

        let outcome = coordinator.request_thumbnail(&item, "thumbnail", DOCUMENT).await;
        assert_eq!(outcome, RequestOutcome::Generated(true));
        assert!(repo.artifact(&item.reference, "thumbnail").is_some());
    }

    #[tokio::test]
    async fn test_mode_override() {
        let repo = InMemoryRepository::new();
        let item = repo.insert_file(
            ItemRef::new("video-1", "default"),
            "/files/clip.mp4",
            Some("video/mp4"),
            sample_video(),
        );
        let coordinator = ThumbnailCoordinator::new(
            services(&repo, &VignetteConfig::default()),
            Arc::new(FailingScheduler),
        )
        .with_execution_mode(ExecutionMode::Inline);

        let params = GenerationParams::Video {
            offset_seconds: 5,
            size: ThumbnailDimensions::new(320, 240),
        };
        let outcome = coordinator.request_thumbnail(&item, "thumbnail", params).await;
        assert_eq!(outcome, RequestOutcome::Generated(true));

        let artifact = repo.artifact(&item.reference, "thumbnail").unwrap();
        assert_eq!((artifact.width, artifact.height), (320, 240));
    }

    #[tokio::test]
    async fn test_ineligible_item_skipped() {
        let repo = InMemoryRepository::new();
        let folder = repo.insert_folder(ItemRef::new("folder-1", "default"), "/files");
        let coordinator = ThumbnailCoordinator::new(
            services(&repo, &VignetteConfig::default()),
            Arc::new(FailingScheduler),
        );

        let outcome = coordinator.request_thumbnail(&folder, "thumbnail", DOCUMENT).await;
        assert_eq!(outcome, RequestOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_disabled_service_skipped() {
        let repo = InMemoryRepository::new();
        let item = pdf_item(&repo);
        let mut config = VignetteConfig::default();
        config.document.enabled = false;
        let coordinator =
            ThumbnailCoordinator::new(services(&repo, &config), Arc::new(FailingScheduler));

        let outcome = coordinator.request_thumbnail(&item, "thumbnail", DOCUMENT).await;
        assert_eq!(outcome, RequestOutcome::Skipped);
    }

    fn panicking_services(repo: &InMemoryRepository) -> ThumbnailServices {
        let mut config = VignetteConfig::default();
        config.document.use_background_job = false;
        ThumbnailServices::with_converters(
            &config,
            Arc::new(repo.clone()),
            Converters {
                document: None,
                renderer: Some(Arc::new(FakePdfRenderer::new(1, 612, 792).panicking())),
                extractor: None,
            },
        )
    }

    #[tokio::test]
    async fn test_engine_panic_is_unexpected_error() {
        let repo = InMemoryRepository::new();
        let item = pdf_item(&repo);
        let generator = panicking_services(&repo).generator_for(&DOCUMENT);

        let err = ThumbnailCoordinator::generate_inline(generator, &item, "thumbnail", DOCUMENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Unexpected { .. }));
        assert_eq!(err.path(), Some("/files/report.pdf"));
    }

    #[tokio::test]
    async fn test_engine_panic_reported_as_failed() {
        let repo = InMemoryRepository::new();
        let item = pdf_item(&repo);
        let coordinator =
            ThumbnailCoordinator::new(panicking_services(&repo), Arc::new(FailingScheduler));

        let outcome = coordinator.request_thumbnail(&item, "thumbnail", DOCUMENT).await;
        assert_eq!(outcome, RequestOutcome::Failed);
        assert_eq!(repo.child_count(&item.reference), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_propagate() {
        let repo = InMemoryRepository::new();
        let item = repo.insert_file(
            ItemRef::new("pdf-2", "default"),
            "/files/broken.pdf",
            Some("application/pdf"),
            corrupt_pdf(),
        );
        let config = VignetteConfig::default();

        let inline = ThumbnailCoordinator::new(services(&repo, &config), Arc::new(FailingScheduler))
            .with_execution_mode(ExecutionMode::Inline);
        assert_eq!(
            inline.request_thumbnail(&item, "thumbnail", DOCUMENT).await,
            RequestOutcome::Failed
        );

        let deferred =
            ThumbnailCoordinator::new(services(&repo, &config), Arc::new(FailingScheduler));
        assert_eq!(
            deferred.request_thumbnail(&item, "thumbnail", DOCUMENT).await,
            RequestOutcome::Failed
        );
    }
}
