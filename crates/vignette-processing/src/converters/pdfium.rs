//! pdfium page renderer

use super::PdfRenderer;
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::sync::Arc;
use vignette_core::ConversionError;

const ENGINE: &str = "pdfium";

/// Renders PDF pages through a dynamically loaded pdfium library.
///
/// Rendering is blocking and runs on the blocking thread pool.
pub struct PdfiumRenderer {
    pdfium: Arc<Pdfium>,
}

impl PdfiumRenderer {
    /// Bind to the pdfium library in `library_dir`, or to the system library when no
    /// directory is given or nothing loadable is found there.
    pub fn bind(library_dir: Option<&str>) -> Result<Self, ConversionError> {
        let bindings = match library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ConversionError::EngineUnavailable(format!("{}: {:?}", ENGINE, e)))?;

        Ok(Self {
            pdfium: Arc::new(Pdfium::new(bindings)),
        })
    }
}

fn render(pdfium: &Pdfium, pdf: &[u8], page_index: u32) -> Result<DynamicImage, ConversionError> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| ConversionError::InvalidSource(format!("{:?}", e)))?;

    let pages = document.pages();
    let page_count = pages.len() as u32;
    if page_index >= page_count {
        return Err(ConversionError::PageOutOfRange {
            page_index,
            page_count,
        });
    }

    let page = pages
        .get(page_index as u16)
        .map_err(|e| ConversionError::engine_failed(ENGINE, format!("{:?}", e)))?;

    let bitmap = page
        .render_with_config(&PdfRenderConfig::new())
        .map_err(|e| ConversionError::engine_failed(ENGINE, format!("{:?}", e)))?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;

    // pdfium hands out BGRA pixels.
    let mut pixels: Vec<u8> = bitmap.as_raw_bytes().to_vec();
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    RgbaImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| {
            ConversionError::Decode(format!(
                "pdfium bitmap does not match {}x{}",
                width, height
            ))
        })
}

#[async_trait]
impl PdfRenderer for PdfiumRenderer {
    fn is_available(&self) -> bool {
        true
    }

    async fn render_page(
        &self,
        pdf: Bytes,
        page_index: u32,
    ) -> Result<DynamicImage, ConversionError> {
        let pdfium = Arc::clone(&self.pdfium);
        match tokio::task::spawn_blocking(move || render(&pdfium, &pdf, page_index)).await {
            Ok(result) => result,
            // Surface the panic to the caller's task boundary.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ConversionError::engine_failed(ENGINE, e.to_string())),
        }
    }
}
