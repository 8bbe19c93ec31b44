//! Video thumbnail service

use crate::capability::CapabilityGate;
use crate::converters::FrameExtractor;
use crate::document::log_generation_error;
use crate::scaler::{ImageScaler, TargetSize};
use crate::store::ThumbnailStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempPath;
use vignette_core::{
    ConversionError, MimeGroups, SourceItem, ThumbnailDimensions, ThumbnailError,
    VideoThumbnailConfig, VignetteConfig,
};
use vignette_repository::ContentRepository;

const SOURCE_PREFIX: &str = "video-thumbnail-source";
const FRAME_PREFIX: &str = "video-thumbnail";

pub struct VideoThumbnailService {
    config: VideoThumbnailConfig,
    gate: CapabilityGate,
    repository: Arc<dyn ContentRepository>,
    extractor: Option<Arc<dyn FrameExtractor>>,
    store: ThumbnailStore,
}

impl VideoThumbnailService {
    pub fn new(
        config: &VignetteConfig,
        repository: Arc<dyn ContentRepository>,
        extractor: Option<Arc<dyn FrameExtractor>>,
    ) -> Self {
        Self::with_settings(
            config.video.clone(),
            config.mime_groups.clone(),
            repository,
            extractor,
        )
    }

    pub fn with_settings(
        config: VideoThumbnailConfig,
        mime_groups: MimeGroups,
        repository: Arc<dyn ContentRepository>,
        extractor: Option<Arc<dyn FrameExtractor>>,
    ) -> Self {
        Self {
            gate: CapabilityGate::for_videos(&config, mime_groups),
            store: ThumbnailStore::new(Arc::clone(&repository), config.image_format),
            repository,
            extractor,
            config,
        }
    }

    /// The service is switched on and a frame extractor is available.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.available_extractor().is_some()
    }

    pub fn use_background_job(&self) -> bool {
        self.config.use_background_job
    }

    /// The service is enabled and the item is a video with content.
    pub fn can_handle(&self, item: &SourceItem) -> bool {
        self.is_enabled() && self.gate.can_handle(item)
    }

    fn available_extractor(&self) -> Option<&Arc<dyn FrameExtractor>> {
        self.extractor.as_ref().filter(|e| e.is_available())
    }

    fn parse_size(size: &str) -> Result<ThumbnailDimensions, ThumbnailError> {
        ThumbnailDimensions::parse(size).map_err(ThumbnailError::InvalidRequest)
    }

    fn check_offset(offset_seconds: i64) -> Result<(), ThumbnailError> {
        if offset_seconds < 0 {
            return Err(ThumbnailError::InvalidRequest(format!(
                "Time offset must not be negative, got {} seconds",
                offset_seconds
            )));
        }
        Ok(())
    }

    /// Generate a thumbnail from the frame at `offset_seconds`, scaled into `size`
    /// (`WxH`). Returns every failure.
    pub async fn try_create_thumbnail(
        &self,
        item: &SourceItem,
        name: &str,
        offset_seconds: i64,
        size: &str,
    ) -> Result<bool, ThumbnailError> {
        let dims = Self::parse_size(size)?;
        self.try_create_thumbnail_with(item, name, offset_seconds, dims)
            .await
    }

    #[tracing::instrument(skip(self, item), fields(path = %item.path))]
    pub async fn try_create_thumbnail_with(
        &self,
        item: &SourceItem,
        name: &str,
        offset_seconds: i64,
        size: ThumbnailDimensions,
    ) -> Result<bool, ThumbnailError> {
        if !self.can_handle(item) {
            return Ok(false);
        }
        Self::check_offset(offset_seconds)?;

        let extractor = match self.available_extractor() {
            Some(extractor) => extractor,
            None => {
                tracing::info!("Frame extractor is not available, cannot generate video thumbnail");
                return Ok(false);
            }
        };

        let start = Instant::now();
        let conversion_error = |e: ConversionError| ThumbnailError::conversion(&item.path, e);

        let content = self
            .repository
            .read_content(item)
            .await
            .map_err(|e| ThumbnailError::repository(&item.path, e))?;

        let source = tempfile::Builder::new()
            .prefix(SOURCE_PREFIX)
            .tempfile()
            .map_err(|e| conversion_error(e.into()))?;
        tokio::fs::write(source.path(), &content)
            .await
            .map_err(|e| conversion_error(e.into()))?;
        drop(content);

        let frame_file = new_frame_path().map_err(conversion_error)?;
        extractor
            .extract_frame(source.path(), &frame_file, offset_seconds, None)
            .await
            .map_err(conversion_error)?;

        let frame_data = tokio::fs::read(&frame_file)
            .await
            .map_err(|e| conversion_error(e.into()))?;
        let frame = image::load_from_memory(&frame_data)
            .map_err(|e| conversion_error(ConversionError::Decode(e.to_string())))?;
        drop(frame_data);

        let thumbnail = ImageScaler::scale(&frame, TargetSize::Box(size));
        let artifact = self.store.store(item, &thumbnail, name).await?;

        tracing::debug!(
            width = artifact.width,
            height = artifact.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Generated video thumbnail"
        );

        Ok(true)
    }

    /// Like [`try_create_thumbnail`](Self::try_create_thumbnail), but conversion and
    /// unexpected failures are logged and reported as `Ok(false)`.
    pub async fn create_thumbnail(
        &self,
        item: &SourceItem,
        name: &str,
        offset_seconds: i64,
        size: &str,
    ) -> Result<bool, ThumbnailError> {
        match self
            .try_create_thumbnail(item, name, offset_seconds, size)
            .await
        {
            Ok(created) => Ok(created),
            Err(e) if e.is_repository() => Err(e),
            Err(e) => {
                log_generation_error(&e, &item.path);
                Ok(false)
            }
        }
    }

    /// Extract a frame of a local video file into `output`, fitted into `size` (`WxH`).
    ///
    /// Returns `Ok(false)` when no frame extractor is available.
    pub async fn generate_thumbnail(
        &self,
        video: &Path,
        output: &Path,
        offset_seconds: i64,
        size: &str,
    ) -> Result<bool, ThumbnailError> {
        let dims = Self::parse_size(size)?;
        Self::check_offset(offset_seconds)?;
        let extractor = match self.available_extractor() {
            Some(extractor) => extractor,
            None => return Ok(false),
        };

        let path = video.display().to_string();
        extractor
            .extract_frame(video, output, offset_seconds, Some(dims))
            .await
            .map_err(|e| ThumbnailError::conversion(path, e))?;

        Ok(true)
    }

    /// Like [`generate_thumbnail`](Self::generate_thumbnail), writing to a new temporary
    /// file. The file is deleted when the returned path is dropped.
    pub async fn generate_thumbnail_file(
        &self,
        video: &Path,
        offset_seconds: i64,
        size: &str,
    ) -> Result<Option<TempPath>, ThumbnailError> {
        let output = new_frame_path()
            .map_err(|e| ThumbnailError::conversion(video.display().to_string(), e))?;

        if self
            .generate_thumbnail(video, &output, offset_seconds, size)
            .await?
        {
            Ok(Some(output))
        } else {
            Ok(None)
        }
    }
}

fn new_frame_path() -> Result<TempPath, ConversionError> {
    Ok(tempfile::Builder::new()
        .prefix(FRAME_PREFIX)
        .suffix(".jpg")
        .tempfile()?
        .into_temp_path())
}
