//! Document-to-PDF normalizer

use crate::converters::DocumentConverter;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use vignette_core::mime::{PDF_GROUP, PDF_MIME_TYPE};
use vignette_core::{ConversionError, MimeGroups, SourceItem, ThumbnailError};

const SOURCE_PREFIX: &str = "doc-thumbnail-source";

/// Result of normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    Pdf(Bytes),
    /// The item is not a PDF and no converter is available.
    Disabled,
}

/// Brings any supported document into PDF form.
pub struct PdfNormalizer {
    converter: Option<Arc<dyn DocumentConverter>>,
    mime_groups: MimeGroups,
}

impl PdfNormalizer {
    pub fn new(converter: Option<Arc<dyn DocumentConverter>>, mime_groups: MimeGroups) -> Self {
        Self {
            converter,
            mime_groups,
        }
    }

    pub fn is_pdf(&self, mime_type: &str) -> bool {
        self.mime_groups.is_mime_type_group(mime_type, PDF_GROUP)
    }

    pub fn converter_available(&self) -> bool {
        self.converter
            .as_ref()
            .map(|c| c.is_available())
            .unwrap_or(false)
    }

    /// Whether content of this type can be turned into a PDF at all.
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.is_pdf(mime_type) || self.converter_available()
    }

    pub async fn to_pdf(
        &self,
        item: &SourceItem,
        content: Bytes,
        source_mime: &str,
    ) -> Result<PdfSource, ThumbnailError> {
        if self.is_pdf(source_mime) {
            return Ok(PdfSource::Pdf(content));
        }

        let converter = match &self.converter {
            Some(converter) if converter.is_available() => converter,
            _ => return Ok(PdfSource::Disabled),
        };

        if content.is_empty() {
            return Err(ThumbnailError::conversion(
                &item.path,
                ConversionError::EmptySource,
            ));
        }

        let start = Instant::now();

        let source = tempfile::Builder::new()
            .prefix(SOURCE_PREFIX)
            .suffix(&source_suffix(&item.name))
            .tempfile()
            .map_err(|e| ThumbnailError::conversion(&item.path, e))?;
        tokio::fs::write(source.path(), &content)
            .await
            .map_err(|e| ThumbnailError::conversion(&item.path, e))?;

        let converted = converter
            .convert(source.path(), source_mime, PDF_MIME_TYPE)
            .await
            .map_err(|e| ThumbnailError::conversion(&item.path, e))?;

        let pdf = tokio::fs::read(converted.path())
            .await
            .map_err(|e| ThumbnailError::conversion(&item.path, e))?;

        tracing::debug!(
            path = %item.path,
            source_mime = %source_mime,
            pdf_bytes = pdf.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Converted document to PDF"
        );

        Ok(PdfSource::Pdf(Bytes::from(pdf)))
    }
}

/// Keep the item's extension on the temporary copy; LibreOffice uses it as a hint.
fn source_suffix(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeDocumentConverter;
    use chrono::Utc;
    use vignette_core::{ItemRef, NodeType};

    fn item(name: &str, mime: &str) -> SourceItem {
        SourceItem {
            reference: ItemRef::new("doc-1", "default"),
            path: format!("/files/{}", name),
            name: name.to_string(),
            node_type: NodeType::File,
            mime_type: Some(mime.to_string()),
            content_length: 4,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_source_suffix() {
        assert_eq!(source_suffix("report.DOCX"), ".docx");
        assert_eq!(source_suffix("noext"), "");
        assert_eq!(source_suffix("weird.na me"), "");
    }

    #[tokio::test]
    async fn test_pdf_passes_through() {
        let converter = Arc::new(FakeDocumentConverter::new());
        let normalizer = PdfNormalizer::new(Some(converter.clone()), MimeGroups::default());
        let content = Bytes::from_static(b"%PDF-1.4 data");

        let result = normalizer
            .to_pdf(&item("a.pdf", "application/pdf"), content.clone(), "application/pdf")
            .await
            .unwrap();

        assert_eq!(result, PdfSource::Pdf(content));
        assert_eq!(converter.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_converter_is_disabled() {
        let normalizer = PdfNormalizer::new(None, MimeGroups::default());
        let result = normalizer
            .to_pdf(
                &item("a.docx", "application/msword"),
                Bytes::from_static(b"PK\x03\x04"),
                "application/msword",
            )
            .await
            .unwrap();
        assert_eq!(result, PdfSource::Disabled);
        assert!(!normalizer.accepts("application/msword"));
        assert!(normalizer.accepts("application/pdf"));
    }

    #[tokio::test]
    async fn test_unavailable_converter_is_disabled() {
        let converter = Arc::new(FakeDocumentConverter::new().unavailable());
        let normalizer = PdfNormalizer::new(Some(converter.clone()), MimeGroups::default());
        let result = normalizer
            .to_pdf(
                &item("a.docx", "application/msword"),
                Bytes::from_static(b"PK\x03\x04"),
                "application/msword",
            )
            .await
            .unwrap();
        assert_eq!(result, PdfSource::Disabled);
        assert_eq!(converter.calls(), 0);
    }

    #[tokio::test]
    async fn test_converts_office_document() {
        let converter = Arc::new(FakeDocumentConverter::new());
        let normalizer = PdfNormalizer::new(Some(converter.clone()), MimeGroups::default());

        let result = normalizer
            .to_pdf(
                &item("a.docx", "application/msword"),
                Bytes::from_static(b"PK\x03\x04"),
                "application/msword",
            )
            .await
            .unwrap();

        match result {
            PdfSource::Pdf(pdf) => assert!(pdf.starts_with(b"%PDF")),
            PdfSource::Disabled => panic!("expected converted PDF"),
        }
        assert_eq!(converter.calls(), 1);
        assert!(!converter.last_input_exists());
    }

    #[tokio::test]
    async fn test_converter_failure_carries_path() {
        let converter = Arc::new(FakeDocumentConverter::new().failing());
        let normalizer = PdfNormalizer::new(Some(converter), MimeGroups::default());

        let err = normalizer
            .to_pdf(
                &item("broken.docx", "application/msword"),
                Bytes::from_static(b"PK\x03\x04"),
                "application/msword",
            )
            .await
            .unwrap_err();

        assert_eq!(err.path(), Some("/files/broken.docx"));
        assert!(matches!(err, ThumbnailError::Conversion { .. }));
    }
}
