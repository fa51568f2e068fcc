//! PDF text-layer access.

mod extractor;

pub use extractor::PdfExtractor;
#[cfg(test)]
pub(crate) use extractor::test_pdf;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Magic bytes at the start of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Whether `data` looks like a PDF file.
pub fn is_pdf(data: &[u8]) -> bool {
    // Some producers emit a BOM or whitespace before the header
    data.windows(PDF_MAGIC.len())
        .take(1024)
        .any(|w| w == PDF_MAGIC)
}

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Extract text from a specific page (1-indexed).
    fn extract_page_text(&self, page: u32) -> Result<String>;

    /// Extract the text of every page, in page order.
    fn extract_page_texts(&self) -> Result<Vec<String>> {
        (1..=self.page_count())
            .map(|page| self.extract_page_text(page))
            .collect()
    }
}
