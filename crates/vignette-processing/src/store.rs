//! Thumbnail store writer
//!
//! Encodes a bitmap and writes it as a named child of its source item, replacing any
//! previous thumbnail with the same name.

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use vignette_core::{
    ConversionError, RepositoryError, SourceItem, ThumbnailArtifact, ThumbnailError,
    ThumbnailFormat,
};
use vignette_repository::{ArtifactNode, ArtifactWrite, ContentRepository};

const JPEG_QUALITY: u8 = 85;

pub struct ThumbnailStore {
    repository: Arc<dyn ContentRepository>,
    format: ThumbnailFormat,
}

impl ThumbnailStore {
    pub fn new(repository: Arc<dyn ContentRepository>, format: ThumbnailFormat) -> Self {
        Self { repository, format }
    }

    pub fn format(&self) -> ThumbnailFormat {
        self.format
    }

    /// Encode `image` in the store's format. JPEG output drops the alpha channel.
    pub fn encode(image: &DynamicImage, format: ThumbnailFormat) -> Result<Vec<u8>, ConversionError> {
        let mut buffer = Vec::new();
        match format {
            ThumbnailFormat::Png => {
                image
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                    .map_err(|e| ConversionError::Encode(e.to_string()))?;
            }
            ThumbnailFormat::Jpeg => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
                    .encode_image(&rgb)
                    .map_err(|e| ConversionError::Encode(e.to_string()))?;
            }
        }
        Ok(buffer)
    }

    pub async fn store(
        &self,
        item: &SourceItem,
        image: &DynamicImage,
        name: &str,
    ) -> Result<ThumbnailArtifact, ThumbnailError> {
        let (width, height) = image.dimensions();
        let data =
            Self::encode(image, self.format).map_err(|e| ThumbnailError::conversion(&item.path, e))?;

        let repository_error = |e: RepositoryError| ThumbnailError::repository(&item.path, e);

        self.repository
            .checkout(item)
            .await
            .map_err(repository_error)?;

        let node = match self
            .repository
            .find_child(item, name)
            .await
            .map_err(repository_error)?
        {
            Some(node) => node,
            None => self
                .add_or_find_child(item, name)
                .await
                .map_err(repository_error)?,
        };

        let now = Utc::now();
        let artifact = self
            .repository
            .write_artifact(
                &node,
                ArtifactWrite {
                    data,
                    width,
                    height,
                    mime_type: self.format.mime_type().to_string(),
                    last_modified: now,
                },
            )
            .await
            .map_err(repository_error)?;

        self.repository
            .set_last_modified(item, now)
            .await
            .map_err(repository_error)?;

        tracing::debug!(
            path = %artifact.path,
            width,
            height,
            size_bytes = artifact.size_bytes,
            mime_type = %artifact.mime_type,
            "Thumbnail stored"
        );

        Ok(artifact)
    }

    /// Create the named child, or pick up the one a concurrent writer created first.
    async fn add_or_find_child(
        &self,
        item: &SourceItem,
        name: &str,
    ) -> Result<ArtifactNode, RepositoryError> {
        match self.repository.add_image_child(item, name).await {
            Ok(node) => Ok(node),
            Err(RepositoryError::AlreadyExists(reason)) => {
                tracing::debug!(
                    path = %item.path,
                    thumbnail = %name,
                    "Thumbnail child created concurrently, reusing it"
                );
                self.repository
                    .find_child(item, name)
                    .await?
                    .ok_or(RepositoryError::AlreadyExists(reason))
            }
            Err(e) => Err(e),
        }
    }
}
