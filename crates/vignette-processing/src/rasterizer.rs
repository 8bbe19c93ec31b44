//! Page rasterizer

use crate::converters::PdfRenderer;
use bytes::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use vignette_core::{ConversionError, ThumbnailError};

const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Renders single pages of PDF content.
pub struct PageRasterizer {
    renderer: Option<Arc<dyn PdfRenderer>>,
}

impl PageRasterizer {
    pub fn new(renderer: Option<Arc<dyn PdfRenderer>>) -> Self {
        Self { renderer }
    }

    pub fn is_available(&self) -> bool {
        self.renderer
            .as_ref()
            .map(|r| r.is_available())
            .unwrap_or(false)
    }

    /// Render page `page_index` of `pdf`. `item_path` is only used for error reporting.
    pub async fn rasterize(
        &self,
        item_path: &str,
        pdf: Bytes,
        page_index: u32,
    ) -> Result<DynamicImage, ThumbnailError> {
        validate_pdf(&pdf).map_err(|e| ThumbnailError::conversion(item_path, e))?;

        let renderer = match &self.renderer {
            Some(renderer) if renderer.is_available() => renderer,
            _ => {
                return Err(ThumbnailError::conversion(
                    item_path,
                    ConversionError::EngineUnavailable("PDF renderer".to_string()),
                ))
            }
        };

        renderer
            .render_page(pdf, page_index)
            .await
            .map_err(|e| ThumbnailError::conversion(item_path, e))
    }
}

/// Reject content that cannot be a PDF before handing it to the engine.
pub fn validate_pdf(data: &[u8]) -> Result<(), ConversionError> {
    if data.is_empty() {
        return Err(ConversionError::EmptySource);
    }

    if !data.starts_with(PDF_SIGNATURE) {
        return Err(ConversionError::InvalidSource(
            "missing %PDF signature".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_pdf, FakePdfRenderer};
    use image::GenericImageView;

    #[test]
    fn test_validate_pdf() {
        assert!(matches!(validate_pdf(b""), Err(ConversionError::EmptySource)));
        assert!(matches!(
            validate_pdf(b"PK\x03\x04"),
            Err(ConversionError::InvalidSource(_))
        ));
        assert!(validate_pdf(b"%PDF-1.7\n").is_ok());
    }

    #[tokio::test]
    async fn test_renders_first_page() {
        let renderer = Arc::new(FakePdfRenderer::new(3, 600, 800));
        let rasterizer = PageRasterizer::new(Some(renderer.clone()));

        let image = rasterizer
            .rasterize("/files/a.pdf", sample_pdf(), 0)
            .await
            .unwrap();
        assert_eq!(image.dimensions(), (600, 800));
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let rasterizer = PageRasterizer::new(Some(Arc::new(FakePdfRenderer::new(1, 600, 800))));
        let err = rasterizer
            .rasterize("/files/a.pdf", sample_pdf(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ThumbnailError::Conversion {
                source: ConversionError::PageOutOfRange {
                    page_index: 1,
                    page_count: 1
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_content_never_reaches_engine() {
        let renderer = Arc::new(FakePdfRenderer::new(1, 600, 800));
        let rasterizer = PageRasterizer::new(Some(renderer.clone()));

        assert!(rasterizer
            .rasterize("/files/a.pdf", Bytes::new(), 0)
            .await
            .is_err());
        assert!(rasterizer
            .rasterize("/files/a.pdf", Bytes::from_static(b"not a pdf"), 0)
            .await
            .is_err());
        assert_eq!(renderer.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_renderer() {
        let rasterizer = PageRasterizer::new(None);
        assert!(!rasterizer.is_available());
        let err = rasterizer
            .rasterize("/files/a.pdf", sample_pdf(), 0)
            .await
            .unwrap_err();
        assert_eq!(err.path(), Some("/files/a.pdf"));
    }
}
