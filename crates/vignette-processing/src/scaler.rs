//! Frame and page scaling

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use vignette_core::ThumbnailDimensions;

/// Bounding box a thumbnail must fit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// `n x n` box, used for document pages.
    Square(u32),
    /// Explicit box, used for video frames.
    Box(ThumbnailDimensions),
}

impl TargetSize {
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            TargetSize::Square(size) => (*size, *size),
            TargetSize::Box(dims) => (dims.width, dims.height),
        }
    }
}

/// Image scaling operations
pub struct ImageScaler;

impl ImageScaler {
    /// Largest size with the original aspect ratio that fits into `bounds`.
    ///
    /// Never grows the image unless `allow_upscale` is set. Both sides are at least 1.
    pub fn fit_dimensions(
        orig_width: u32,
        orig_height: u32,
        bounds: (u32, u32),
        allow_upscale: bool,
    ) -> (u32, u32) {
        let (box_width, box_height) = bounds;
        if orig_width == 0 || orig_height == 0 || box_width == 0 || box_height == 0 {
            return (orig_width.max(1), orig_height.max(1));
        }

        let scale_width = box_width as f64 / orig_width as f64;
        let scale_height = box_height as f64 / orig_height as f64;
        let mut scale = scale_width.min(scale_height);
        if !allow_upscale {
            scale = scale.min(1.0);
        }

        let width = ((orig_width as f64 * scale).round() as u32).clamp(1, box_width.max(1));
        let height = ((orig_height as f64 * scale).round() as u32).clamp(1, box_height.max(1));

        if allow_upscale {
            (width, height)
        } else {
            (width.min(orig_width), height.min(orig_height))
        }
    }

    /// Select appropriate filter type based on reduction ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Scale `image` into `target`, keeping its aspect ratio and never upscaling.
    pub fn scale(image: &DynamicImage, target: TargetSize) -> DynamicImage {
        Self::scale_with(image, target, false)
    }

    pub fn scale_with(image: &DynamicImage, target: TargetSize, allow_upscale: bool) -> DynamicImage {
        let (orig_width, orig_height) = image.dimensions();
        let (width, height) =
            Self::fit_dimensions(orig_width, orig_height, target.bounds(), allow_upscale);

        if (width, height) == (orig_width, orig_height) {
            return image.clone();
        }

        let filter = Self::select_filter(orig_width, orig_height, width, height);
        image.resize_exact(width, height, filter)
    }
}
