//! Image preprocessing ahead of tesseract.

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use tracing::debug;

use crate::models::config::OcrConfig;

/// Image preprocessor for the OCR backend.
pub struct ImagePreprocessor {
    /// Maximum image dimension.
    max_size: u32,
    grayscale: bool,
    binarize: bool,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self {
            max_size: 4000,
            grayscale: true,
            binarize: false,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            max_size: config.max_image_size.max(1),
            grayscale: config.grayscale,
            binarize: config.binarize,
        }
    }

    /// Set maximum image dimension.
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size.max(1);
        self
    }

    pub fn with_binarize(mut self, binarize: bool) -> Self {
        self.binarize = binarize;
        self
    }

    /// Whether [`prepare`](Self::prepare) would leave `image` untouched.
    pub fn is_noop(&self, image: &DynamicImage) -> bool {
        let (w, h) = image.dimensions();
        !self.grayscale && !self.binarize && w.max(h) <= self.max_size
    }

    /// Downscale, convert to grayscale and optionally binarize.
    pub fn prepare(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = fit_within(width, height, self.max_size);

        let resized = if (new_width, new_height) != (width, height) {
            debug!(
                "Downscaling {}x{} to {}x{} for OCR",
                width, height, new_width, new_height
            );
            image.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        if !self.grayscale && !self.binarize {
            return resized;
        }

        let gray = resized.to_luma8();
        if self.binarize {
            DynamicImage::ImageLuma8(adaptive_threshold(&gray, 31, 10))
        } else {
            DynamicImage::ImageLuma8(gray)
        }
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let max_dim = width.max(height);
    if max_dim <= max_size {
        return (width, height);
    }

    let scale = max_size as f64 / max_dim as f64;
    let new_width = (width as f64 * scale).round() as u32;
    let new_height = (height as f64 * scale).round() as u32;
    (new_width.max(1), new_height.max(1))
}

/// Local-mean thresholding over a `block`-sized square, using a summed-area
/// table so the cost does not grow with the block size.
fn adaptive_threshold(image: &GrayImage, block: u32, offset: i64) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row_sum;
        }
    }

    let half = (block / 2) as usize;
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(h));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(w));
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let mean = (sum / count) as i64;

            let value = image.get_pixel(x as u32, y as u32)[0] as i64;
            let pixel = if value > mean - offset { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([pixel]));
        }
    }

    out
}
