//! Fake conversion engines for testing
//!
//! The fakes behave like the real engines at the trait boundary (temp directories,
//! page bounds, missing frames) without needing LibreOffice, pdfium or FFmpeg.

use crate::converters::{ConvertedDocument, DocumentConverter, FrameExtractor, PdfRenderer};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use vignette_core::{ConversionError, ThumbnailDimensions};

/// Marker that makes [`FakePdfRenderer`] treat content as undecodable.
pub const CORRUPT_MARKER: &[u8] = b"CORRUPT";

/// Minimal PDF-looking content.
pub fn sample_pdf() -> Bytes {
    Bytes::from_static(b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n")
}

/// Content that passes the signature check but cannot be rendered.
pub fn corrupt_pdf() -> Bytes {
    Bytes::from_static(b"%PDF-1.4\nCORRUPT\n")
}

/// Arbitrary non-empty bytes standing in for a video stream.
pub fn sample_video() -> Vec<u8> {
    b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom".to_vec()
}

/// Opaque test image with a darker band, so scaling has something to resample.
pub fn solid_image(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([250, 250, 250, 255]));
    for y in 0..(height / 4) {
        for x in 0..width {
            img.put_pixel(x, y, Rgba([30, 60, 90, 255]));
        }
    }
    DynamicImage::ImageRgba8(img)
}

/// Document converter that always produces [`sample_pdf`].
pub struct FakeDocumentConverter {
    available: bool,
    fail: bool,
    calls: AtomicUsize,
    last_input: Mutex<Option<PathBuf>>,
}

impl FakeDocumentConverter {
    pub fn new() -> Self {
        Self {
            available: true,
            fail: false,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the input file of the last conversion still exists.
    pub fn last_input_exists(&self) -> bool {
        self.last_input
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}

impl Default for FakeDocumentConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentConverter for FakeDocumentConverter {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn convert(
        &self,
        input: &Path,
        _source_mime: &str,
        _target_mime: &str,
    ) -> Result<ConvertedDocument, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.to_path_buf());

        if self.fail {
            return Err(ConversionError::engine_failed(
                "soffice",
                "source file could not be loaded",
            ));
        }

        let content = tokio::fs::read(input).await?;
        if content.is_empty() {
            return Err(ConversionError::EmptySource);
        }

        let dir = tempfile::TempDir::new()?;
        let output = dir.path().join("converted.pdf");
        tokio::fs::write(&output, sample_pdf()).await?;
        Ok(ConvertedDocument::new(dir, output))
    }
}

/// Renderer producing a blank page of fixed size for every page of a document.
pub struct FakePdfRenderer {
    page_count: u32,
    width: u32,
    height: u32,
    available: bool,
    panics: bool,
    calls: AtomicUsize,
}

impl FakePdfRenderer {
    pub fn new(page_count: u32, width: u32, height: u32) -> Self {
        Self {
            page_count,
            width,
            height,
            available: true,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Panic inside `render_page`, like a crashing native engine binding.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfRenderer for FakePdfRenderer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn render_page(
        &self,
        pdf: Bytes,
        page_index: u32,
    ) -> Result<DynamicImage, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("renderer crashed on page {}", page_index);
        }

        if pdf
            .windows(CORRUPT_MARKER.len())
            .any(|window| window == CORRUPT_MARKER)
        {
            return Err(ConversionError::InvalidSource(
                "unable to parse document".to_string(),
            ));
        }

        if page_index >= self.page_count {
            return Err(ConversionError::PageOutOfRange {
                page_index,
                page_count: self.page_count,
            });
        }

        Ok(solid_image(self.width, self.height))
    }
}

/// Frame extractor for a video of a given duration and frame size.
pub struct FakeFrameExtractor {
    duration_secs: i64,
    width: u32,
    height: u32,
    available: bool,
    calls: AtomicUsize,
    offsets: Mutex<Vec<i64>>,
}

impl FakeFrameExtractor {
    pub fn new(duration_secs: i64, width: u32, height: u32) -> Self {
        Self {
            duration_secs,
            width,
            height,
            available: true,
            calls: AtomicUsize::new(0),
            offsets: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Offsets of all extraction requests, in call order.
    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameExtractor for FakeFrameExtractor {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        offset_seconds: i64,
        size: Option<ThumbnailDimensions>,
    ) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.offsets.lock().unwrap().push(offset_seconds);

        if offset_seconds < 0 {
            return Err(ConversionError::InvalidOffset(offset_seconds));
        }

        let content = tokio::fs::read(video).await?;
        if content.is_empty() {
            return Err(ConversionError::EmptySource);
        }

        if offset_seconds > self.duration_secs {
            return Err(ConversionError::NoOutput(format!(
                "no frame at {}s in {}",
                offset_seconds,
                video.display()
            )));
        }

        let frame = solid_image(self.width, self.height);
        let frame = match size {
            Some(dims) => crate::scaler::ImageScaler::scale(
                &frame,
                crate::scaler::TargetSize::Box(dims),
            ),
            None => frame,
        };

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, 90)
            .encode_image(&frame.to_rgb8())
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        tokio::fs::write(output, buffer).await?;
        Ok(())
    }
}
