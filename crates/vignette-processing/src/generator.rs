//! Common interface of the thumbnail services

use crate::converters::{build_converters, Converters};
use crate::document::DocumentThumbnailService;
use crate::video::VideoThumbnailService;
use async_trait::async_trait;
use std::sync::Arc;
use vignette_core::{GenerationParams, SourceItem, ThumbnailError, VignetteConfig};
use vignette_repository::ContentRepository;

/// A service that can produce thumbnails for some kind of item.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// Short name used in logs ("document", "video").
    fn kind(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    fn can_handle(&self, item: &SourceItem) -> bool;

    /// Whether requests should be deferred to the end of the triggering request.
    fn use_background_job(&self) -> bool;

    /// Generate the thumbnail `name` for `item`, returning every failure.
    async fn generate(
        &self,
        item: &SourceItem,
        name: &str,
        params: &GenerationParams,
    ) -> Result<bool, ThumbnailError>;
}

#[async_trait]
impl ThumbnailGenerator for DocumentThumbnailService {
    fn kind(&self) -> &'static str {
        "document"
    }

    fn is_enabled(&self) -> bool {
        DocumentThumbnailService::is_enabled(self)
    }

    fn can_handle(&self, item: &SourceItem) -> bool {
        DocumentThumbnailService::can_handle(self, item)
    }

    fn use_background_job(&self) -> bool {
        DocumentThumbnailService::use_background_job(self)
    }

    async fn generate(
        &self,
        item: &SourceItem,
        name: &str,
        params: &GenerationParams,
    ) -> Result<bool, ThumbnailError> {
        match params {
            GenerationParams::Document { size } => {
                self.try_create_thumbnail(item, name, *size).await
            }
            other => Err(ThumbnailError::InvalidRequest(format!(
                "document service cannot handle {} parameters",
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl ThumbnailGenerator for VideoThumbnailService {
    fn kind(&self) -> &'static str {
        "video"
    }

    fn is_enabled(&self) -> bool {
        VideoThumbnailService::is_enabled(self)
    }

    fn can_handle(&self, item: &SourceItem) -> bool {
        VideoThumbnailService::can_handle(self, item)
    }

    fn use_background_job(&self) -> bool {
        VideoThumbnailService::use_background_job(self)
    }

    async fn generate(
        &self,
        item: &SourceItem,
        name: &str,
        params: &GenerationParams,
    ) -> Result<bool, ThumbnailError> {
        match params {
            GenerationParams::Video {
                offset_seconds,
                size,
            } => {
                self.try_create_thumbnail_with(item, name, *offset_seconds, *size)
                    .await
            }
            other => Err(ThumbnailError::InvalidRequest(format!(
                "video service cannot handle {} parameters",
                other.kind()
            ))),
        }
    }
}

/// The document and video services, built from one configuration.
#[derive(Clone)]
pub struct ThumbnailServices {
    pub document: Arc<DocumentThumbnailService>,
    pub video: Arc<VideoThumbnailService>,
}

impl ThumbnailServices {
    /// Build both services with the engines named in the configuration.
    pub fn from_config(config: &VignetteConfig, repository: Arc<dyn ContentRepository>) -> Self {
        Self::with_converters(config, repository, build_converters(&config.converters))
    }

    pub fn with_converters(
        config: &VignetteConfig,
        repository: Arc<dyn ContentRepository>,
        converters: Converters,
    ) -> Self {
        let document = DocumentThumbnailService::new(
            config,
            Arc::clone(&repository),
            converters.document,
            converters.renderer,
        );
        let video = VideoThumbnailService::new(config, repository, converters.extractor);

        Self {
            document: Arc::new(document),
            video: Arc::new(video),
        }
    }

    /// The service responsible for `params`.
    pub fn generator_for(&self, params: &GenerationParams) -> Arc<dyn ThumbnailGenerator> {
        match params {
            GenerationParams::Document { .. } => self.document.clone(),
            GenerationParams::Video { .. } => self.video.clone(),
        }
    }
}
