//! Document thumbnail service
//!
//! Produces a thumbnail of the first page of a document. PDF content is rendered
//! directly; other office formats are converted to PDF first when a document converter
//! is available, and are skipped otherwise.

use crate::capability::CapabilityGate;
use crate::converters::{DocumentConverter, PdfRenderer};
use crate::normalizer::{PdfNormalizer, PdfSource};
use crate::rasterizer::PageRasterizer;
use crate::scaler::{ImageScaler, TargetSize};
use crate::store::ThumbnailStore;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use vignette_core::{
    DocumentThumbnailConfig, LogLevel, MimeGroups, SourceItem, ThumbnailError, VignetteConfig,
};
use vignette_repository::ContentRepository;

const FIRST_PAGE: u32 = 0;

pub struct DocumentThumbnailService {
    config: DocumentThumbnailConfig,
    gate: CapabilityGate,
    repository: Arc<dyn ContentRepository>,
    normalizer: PdfNormalizer,
    rasterizer: PageRasterizer,
    store: ThumbnailStore,
}

impl DocumentThumbnailService {
    pub fn new(
        config: &VignetteConfig,
        repository: Arc<dyn ContentRepository>,
        converter: Option<Arc<dyn DocumentConverter>>,
        renderer: Option<Arc<dyn PdfRenderer>>,
    ) -> Self {
        Self::with_settings(
            config.document.clone(),
            config.mime_groups.clone(),
            repository,
            converter,
            renderer,
        )
    }

    pub fn with_settings(
        config: DocumentThumbnailConfig,
        mime_groups: MimeGroups,
        repository: Arc<dyn ContentRepository>,
        converter: Option<Arc<dyn DocumentConverter>>,
        renderer: Option<Arc<dyn PdfRenderer>>,
    ) -> Self {
        Self {
            gate: CapabilityGate::for_documents(&config, mime_groups.clone()),
            normalizer: PdfNormalizer::new(converter, mime_groups),
            rasterizer: PageRasterizer::new(renderer),
            store: ThumbnailStore::new(Arc::clone(&repository), config.image_format),
            repository,
            config,
        }
    }

    /// The service is switched on and able to render pages.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.rasterizer.is_available()
    }

    pub fn use_background_job(&self) -> bool {
        self.config.use_background_job
    }

    /// The service is enabled and the item is a document it renders.
    pub fn can_handle(&self, item: &SourceItem) -> bool {
        self.is_enabled() && self.gate.can_handle(item)
    }

    /// Bitmap of the first page at native resolution.
    ///
    /// Returns `None` for non-PDF content when no document converter is available.
    pub async fn image_of_first_page(
        &self,
        item: &SourceItem,
    ) -> Result<Option<DynamicImage>, ThumbnailError> {
        let mime_type = item.mime_type().unwrap_or_default();

        if !self.normalizer.accepts(mime_type) {
            tracing::info!(
                path = %item.path,
                mime_type = %mime_type,
                "Document converter is not enabled, cannot generate thumbnail for non-PDF item"
            );
            return Ok(None);
        }

        let content = self
            .repository
            .read_content(item)
            .await
            .map_err(|e| ThumbnailError::repository(&item.path, e))?;

        let pdf = match self.normalizer.to_pdf(item, content, mime_type).await? {
            PdfSource::Pdf(pdf) => pdf,
            PdfSource::Disabled => {
                tracing::info!(
                    path = %item.path,
                    "Document converter became unavailable, skipping thumbnail"
                );
                return Ok(None);
            }
        };

        let image = self.rasterizer.rasterize(&item.path, pdf, FIRST_PAGE).await?;
        Ok(Some(image))
    }

    /// Generate the thumbnail, returning every failure.
    ///
    /// `Ok(false)` means the item is not eligible or cannot be converted in the current
    /// configuration; nothing was written in that case.
    #[tracing::instrument(skip(self, item), fields(path = %item.path))]
    pub async fn try_create_thumbnail(
        &self,
        item: &SourceItem,
        name: &str,
        size: u32,
    ) -> Result<bool, ThumbnailError> {
        if !self.can_handle(item) {
            return Ok(false);
        }

        if size == 0 {
            return Err(ThumbnailError::InvalidRequest(
                "Thumbnail size must be greater than zero".to_string(),
            ));
        }

        let start = Instant::now();

        let image = match self.image_of_first_page(item).await? {
            Some(image) => image,
            None => return Ok(false),
        };

        let thumbnail = ImageScaler::scale(&image, TargetSize::Square(size));
        drop(image);

        let artifact = self.store.store(item, &thumbnail, name).await?;

        tracing::debug!(
            width = artifact.width,
            height = artifact.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Generated document thumbnail"
        );

        Ok(true)
    }

    /// Generate the thumbnail, turning conversion failures into "no thumbnail".
    ///
    /// Conversion and unexpected failures are logged with the item path and reported as
    /// `Ok(false)`. Repository failures are still returned.
    pub async fn create_thumbnail(
        &self,
        item: &SourceItem,
        name: &str,
        size: u32,
    ) -> Result<bool, ThumbnailError> {
        match self.try_create_thumbnail(item, name, size).await {
            Ok(created) => Ok(created),
            Err(e) if e.is_repository() => Err(e),
            Err(e) => {
                log_generation_error(&e, &item.path);
                Ok(false)
            }
        }
    }
}

pub(crate) fn log_generation_error(error: &ThumbnailError, path: &str) {
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(path = %path, error = %error, "No thumbnail generated"),
        LogLevel::Warn => tracing::warn!(path = %path, error = %error, "Thumbnail generation failed"),
        LogLevel::Error => {
            tracing::error!(path = %path, error = ?error, "Thumbnail generation failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{corrupt_pdf, sample_pdf, FakeDocumentConverter, FakePdfRenderer};
    use image::GenericImageView;
    use vignette_core::{ConversionError, ItemRef, ThumbnailFormat};
    use vignette_repository::InMemoryRepository;

    const DOCX_MIME: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    struct Fixture {
        repo: InMemoryRepository,
        converter: Arc<FakeDocumentConverter>,
        renderer: Arc<FakePdfRenderer>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repo: InMemoryRepository::new(),
                converter: Arc::new(FakeDocumentConverter::new()),
                renderer: Arc::new(FakePdfRenderer::new(2, 612, 792)),
            }
        }

        fn service(&self, config: DocumentThumbnailConfig, with_converter: bool) -> DocumentThumbnailService {
            let converter: Option<Arc<dyn DocumentConverter>> = if with_converter {
                Some(self.converter.clone())
            } else {
                None
            };
            DocumentThumbnailService::with_settings(
                config,
                MimeGroups::default(),
                Arc::new(self.repo.clone()),
                converter,
                Some(self.renderer.clone()),
            )
        }

        fn pdf_item(&self) -> SourceItem {
            self.repo.insert_file(
                ItemRef::new("pdf-1", "default"),
                "/files/report.pdf",
                Some("application/pdf"),
                sample_pdf(),
            )
        }

        fn docx_item(&self) -> SourceItem {
            self.repo.insert_file(
                ItemRef::new("docx-1", "default"),
                "/files/letter.docx",
                Some(DOCX_MIME),
                b"PK\x03\x04 word document".to_vec(),
            )
        }
    }

    #[tokio::test]
    async fn test_pdf_thumbnail_created() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.pdf_item();

        assert!(service.create_thumbnail(&item, "preview", 150).await.unwrap());

        let artifact = fx.repo.artifact(&item.reference, "preview").unwrap();
        assert_eq!(artifact.mime_type, "image/png");
        assert!(artifact.width <= 150 && artifact.height <= 150);
        assert_eq!((artifact.width, artifact.height), (116, 150));

        let data = fx.repo.read_artifact(&item.reference, "preview").await.unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!(decoded.dimensions(), (artifact.width, artifact.height));
    }

    #[tokio::test]
    async fn test_docx_without_converter_is_skipped() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.docx_item();

        assert!(!service.try_create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        assert_eq!(fx.repo.child_count(&item.reference), 0);
        assert_eq!(fx.renderer.calls(), 0);
    }

    #[tokio::test]
    async fn test_docx_with_converter() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), true);
        let item = fx.docx_item();

        assert!(service.try_create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        assert_eq!(fx.converter.calls(), 1);
        assert!(!fx.converter.last_input_exists());
        assert!(fx.repo.artifact(&item.reference, "thumbnail").is_some());
    }

    #[tokio::test]
    async fn test_unsupported_mime_writes_nothing() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), true);
        let item = fx.repo.insert_file(
            ItemRef::new("img-1", "default"),
            "/files/photo.gif",
            Some("image/gif"),
            b"GIF89a".to_vec(),
        );

        assert!(!service.can_handle(&item));
        assert!(!service.create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        assert_eq!(fx.repo.child_count(&item.reference), 0);
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let fx = Fixture::new();
        let config = DocumentThumbnailConfig {
            enabled: false,
            ..Default::default()
        };
        let service = fx.service(config, true);
        let item = fx.pdf_item();

        assert!(!service.is_enabled());
        assert!(!service.can_handle(&item));
        assert!(!service.create_thumbnail(&item, "thumbnail", 150).await.unwrap());
    }

    #[tokio::test]
    async fn test_idempotent_overwrite() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.pdf_item();

        assert!(service.create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        let first = fx.repo.artifact(&item.reference, "thumbnail").unwrap();
        assert!(service.create_thumbnail(&item, "thumbnail", 64).await.unwrap());
        let second = fx.repo.artifact(&item.reference, "thumbnail").unwrap();

        assert_eq!(fx.repo.child_count(&item.reference), 1);
        assert_eq!(second.height, 64);
        assert!(second.last_modified >= first.last_modified);
    }

    #[tokio::test]
    async fn test_empty_source_is_conversion_failure() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.repo.insert_file(
            ItemRef::new("pdf-empty", "default"),
            "/files/empty.pdf",
            Some("application/pdf"),
            Vec::new(),
        );

        let err = service
            .try_create_thumbnail(&item, "thumbnail", 150)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThumbnailError::Conversion {
                source: ConversionError::EmptySource,
                ..
            }
        ));
        assert_eq!(err.path(), Some("/files/empty.pdf"));

        assert!(!service.create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        assert_eq!(fx.repo.child_count(&item.reference), 0);
    }

    #[tokio::test]
    async fn test_undecodable_source_is_conversion_failure() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.repo.insert_file(
            ItemRef::new("pdf-bad", "default"),
            "/files/bad.pdf",
            Some("application/pdf"),
            corrupt_pdf(),
        );

        let err = service
            .try_create_thumbnail(&item, "thumbnail", 150)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Conversion { .. }));
        assert!(!service.create_thumbnail(&item, "thumbnail", 150).await.unwrap());
        assert_eq!(fx.repo.child_count(&item.reference), 0);
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let item = fx.pdf_item();
        fx.repo.set_fail_writes(true);

        let err = service
            .create_thumbnail(&item, "thumbnail", 150)
            .await
            .unwrap_err();
        assert!(err.is_repository());
    }

    #[tokio::test]
    async fn test_jpeg_output_format() {
        let fx = Fixture::new();
        let config = DocumentThumbnailConfig {
            image_format: ThumbnailFormat::Jpeg,
            ..Default::default()
        };
        let service = fx.service(config, false);
        let item = fx.pdf_item();

        assert!(service.create_thumbnail(&item, "thumbnail", 100).await.unwrap());
        let artifact = fx.repo.artifact(&item.reference, "thumbnail").unwrap();
        assert_eq!(artifact.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_image_of_first_page() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);

        let image = service.image_of_first_page(&fx.pdf_item()).await.unwrap();
        assert_eq!(image.map(|i| i.dimensions()), Some((612, 792)));

        let none = service.image_of_first_page(&fx.docx_item()).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_zero_size_rejected() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let err = service
            .try_create_thumbnail(&fx.pdf_item(), "thumbnail", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_renderer_unavailable_disables_service() {
        let repo = InMemoryRepository::new();
        let service = DocumentThumbnailService::with_settings(
            DocumentThumbnailConfig::default(),
            MimeGroups::default(),
            Arc::new(repo.clone()),
            None,
            Some(Arc::new(FakePdfRenderer::new(1, 10, 10).unavailable())),
        );
        let item = repo.insert_file(
            ItemRef::new("pdf-1", "default"),
            "/files/report.pdf",
            Some("application/pdf"),
            sample_pdf(),
        );

        assert!(!service.is_enabled());
        assert!(!service.can_handle(&item));
        assert!(!service
            .try_create_thumbnail(&item, "thumbnail", 150)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_zero_size_on_ineligible_item_is_skipped() {
        let fx = Fixture::new();
        let service = fx.service(DocumentThumbnailConfig::default(), false);
        let folder = fx.repo.insert_folder(ItemRef::new("dir-1", "default"), "/files");

        assert!(!service
            .try_create_thumbnail(&folder, "thumbnail", 0)
            .await
            .unwrap());
    }
}
