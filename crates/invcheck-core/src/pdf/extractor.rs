//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF text-layer extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Load a PDF straight from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut extractor = Self::new();
        extractor.load(data)?;
        Ok(extractor)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    /// Whole-document extraction through pdf-extract. A panic inside
    /// pdf-extract is reported as an extraction error.
    fn extract_with_pdf_extract(&self) -> Result<String> {
        let data = &self.raw_data;
        match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(PdfError::TextExtraction(e.to_string())),
            Err(_) => Err(PdfError::TextExtraction(
                "pdf-extract panicked while decoding the document".to_string(),
            )),
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf_extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        Ok(self.extract_page_texts()?.join("\n"))
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let doc = self.document()?;
        if page == 0 || page > self.page_count() {
            return Err(PdfError::InvalidPage(page));
        }

        doc.extract_text(&[page])
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    /// Per-page text, falling back to pdf-extract as a single block when
    /// lopdf cannot decode any page.
    fn extract_page_texts(&self) -> Result<Vec<String>> {
        let page_count = self.page_count();
        let mut pages = Vec::with_capacity(page_count as usize);
        let mut failed = 0;

        for page in 1..=page_count {
            match self.extract_page_text(page) {
                Ok(text) => {
                    trace!("Page {}: {} chars", page, text.len());
                    pages.push(text);
                }
                Err(e) => {
                    warn!("lopdf could not read page {}: {}", page, e);
                    failed += 1;
                    pages.push(String::new());
                }
            }
        }

        if pages.iter().any(|p| !p.trim().is_empty()) {
            return Ok(pages);
        }

        debug!(
            "lopdf found no text ({} of {} pages failed), trying pdf-extract",
            failed, page_count
        );
        match self.extract_with_pdf_extract() {
            Ok(text) if !text.trim().is_empty() => Ok(vec![text]),
            Ok(_) => Ok(pages),
            Err(e) => {
                debug!("pdf-extract fallback failed: {}", e);
                Ok(pages)
            }
        }
    }
}
