//! Vignette Processing Library
//!
//! This crate turns repository items into thumbnails: it decides whether an item is
//! eligible, converts office documents to PDF, rasterizes the first page or extracts a
//! video frame, scales the bitmap and writes the result back as a child of the item.
//!
//! The external engines (LibreOffice, pdfium, FFmpeg) sit behind the traits in
//! [`converters`]; each of them may be absent or unavailable at runtime.

pub mod capability;
pub mod converters;
pub mod document;
pub mod generator;
pub mod normalizer;
pub mod rasterizer;
pub mod scaler;
pub mod store;
pub mod video;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use capability::CapabilityGate;
pub use converters::{
    build_converters, ConvertedDocument, Converters, DocumentConverter, FrameExtractor,
    PdfRenderer,
};
pub use document::DocumentThumbnailService;
pub use generator::{ThumbnailGenerator, ThumbnailServices};
pub use normalizer::{PdfNormalizer, PdfSource};
pub use rasterizer::PageRasterizer;
pub use scaler::{ImageScaler, TargetSize};
pub use store::ThumbnailStore;
pub use video::VideoThumbnailService;
