//! OCR fallback for scanned documents.
//!
//! Recognition sits behind the [`OcrBackend`] trait. [`TesseractBackend`]
//! drives the poppler `pdftoppm` and `tesseract` executables.

mod preprocessing;
mod tesseract;

pub use preprocessing::ImagePreprocessor;
pub use tesseract::TesseractBackend;

use image::DynamicImage;

use crate::error::OcrError;

/// Result type for OCR operations.
pub type Result<T> = std::result::Result<T, OcrError>;

/// A text recognizer for rendered pages and uploaded images.
pub trait OcrBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render every page of `pdf` and recognize it.
    ///
    /// Returns one string per page, in page order. `max_pages` of 0 means
    /// no limit.
    fn recognize_pdf(&self, pdf: &[u8], max_pages: usize) -> Result<Vec<String>>;

    /// Recognize a single image.
    fn recognize_image(&self, image: &DynamicImage) -> Result<String>;
}
