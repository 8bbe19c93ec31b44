//! Conversion engines
//!
//! This module defines the interfaces of the external engines used by the pipeline and
//! builds the configured implementations. Every engine reports its availability; an
//! unavailable engine is an expected outcome, not an error.

mod ffmpeg;
#[cfg(feature = "pdfium")]
mod pdfium;
mod soffice;

pub use ffmpeg::FfmpegFrameExtractor;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;
pub use soffice::SofficeConverter;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use vignette_core::{ConversionError, ConverterConfig, ThumbnailDimensions};

/// Output of a document conversion. The file lives inside a private temporary
/// directory that is removed when this value is dropped.
#[derive(Debug)]
pub struct ConvertedDocument {
    dir: TempDir,
    path: PathBuf,
}

impl ConvertedDocument {
    /// `path` must be inside `dir`.
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Converts office documents between formats.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    fn is_available(&self) -> bool;

    /// Convert the file at `input` from `source_mime` to `target_mime`.
    async fn convert(
        &self,
        input: &Path,
        source_mime: &str,
        target_mime: &str,
    ) -> Result<ConvertedDocument, ConversionError>;
}

/// Renders single PDF pages to bitmaps.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Render page `page_index` (zero-based) at the renderer's native resolution.
    async fn render_page(&self, pdf: Bytes, page_index: u32)
        -> Result<DynamicImage, ConversionError>;
}

/// Extracts still frames from video files.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    fn is_available(&self) -> bool;

    /// Write one JPEG frame taken `offset_seconds` after the start of `video` to
    /// `output`, fitted into `size` when given.
    ///
    /// Fails when the offset is negative or when the engine writes no frame, which
    /// is what happens for offsets beyond the end of the stream.
    async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        offset_seconds: i64,
        size: Option<ThumbnailDimensions>,
    ) -> Result<(), ConversionError>;
}

/// The set of engines built from configuration.
#[derive(Clone, Default)]
pub struct Converters {
    pub document: Option<Arc<dyn DocumentConverter>>,
    pub renderer: Option<Arc<dyn PdfRenderer>>,
    pub extractor: Option<Arc<dyn FrameExtractor>>,
}

/// Build the configured engines.
///
/// Disabled engines are left out. A renderer that cannot be bound is left out with a
/// warning so that the document service reports itself disabled.
pub fn build_converters(config: &ConverterConfig) -> Converters {
    let document = if config.document_converter_enabled {
        let converter: Arc<dyn DocumentConverter> =
            Arc::new(SofficeConverter::new(&config.soffice_path, config.timeout_secs));
        Some(converter)
    } else {
        tracing::info!("Document converter disabled, only PDF items get document thumbnails");
        None
    };

    let renderer = build_renderer(config);

    let extractor: Arc<dyn FrameExtractor> =
        Arc::new(FfmpegFrameExtractor::new(&config.ffmpeg_path, config.timeout_secs));

    Converters {
        document,
        renderer,
        extractor: Some(extractor),
    }
}

#[cfg(feature = "pdfium")]
fn build_renderer(config: &ConverterConfig) -> Option<Arc<dyn PdfRenderer>> {
    if !config.pdf_renderer_enabled {
        return None;
    }

    match PdfiumRenderer::bind(config.pdfium_library_path.as_deref()) {
        Ok(renderer) => Some(Arc::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "PDF renderer unavailable");
            None
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn build_renderer(config: &ConverterConfig) -> Option<Arc<dyn PdfRenderer>> {
    if config.pdf_renderer_enabled {
        tracing::warn!("PDF renderer not available (pdfium feature not enabled)");
    }
    None
}

/// Run an external command with a time limit, returning its captured output.
pub(crate) async fn run_with_timeout(
    engine: &'static str,
    command: &mut tokio::process::Command,
    timeout_secs: u64,
) -> Result<std::process::Output, ConversionError> {
    let output = tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        command.kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| ConversionError::Timeout {
        engine,
        seconds: timeout_secs,
    })?
    .map_err(|e| ConversionError::engine_failed(engine, format!("Failed to execute: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConversionError::engine_failed(
            engine,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(output)
}

/// Resolve `program` to an executable, either as a path or through `PATH`.
pub(crate) fn resolve_executable(engine: &str, program: &str) -> Option<PathBuf> {
    match which::which(program) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::info!(engine, program, error = %e, "Conversion engine not found");
            None
        }
    }
}
