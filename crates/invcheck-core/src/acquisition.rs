//! Text acquisition: PDF text layer first, OCR when the layer is too thin.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{PdfError, Result};
use crate::models::analysis::{Document, TextSource};
use crate::models::config::PdfConfig;
use crate::ocr::OcrBackend;
use crate::pdf::{is_pdf, PdfExtractor, PdfProcessor};

/// Turns uploaded bytes into page texts.
pub struct TextAcquirer {
    min_text_length: usize,
    max_pages: usize,
    ocr: Arc<dyn OcrBackend>,
}

impl TextAcquirer {
    pub fn new(config: &PdfConfig, ocr: Arc<dyn OcrBackend>) -> Self {
        Self {
            min_text_length: config.min_text_length,
            max_pages: config.max_pages,
            ocr,
        }
    }

    /// Fill in the text of `document`.
    ///
    /// PDFs use the embedded text layer unless its trimmed length is below
    /// the threshold, in which case every page is OCR'd and the OCR output
    /// replaces the layer text. Images go straight to OCR.
    pub fn acquire(&self, document: Document) -> Result<Document> {
        if is_pdf(&document.bytes) {
            return self.acquire_pdf(document);
        }

        if image::guess_format(&document.bytes).is_ok() {
            let image = image::load_from_memory(&document.bytes)?;
            info!(
                "{}: image upload ({}x{}), running OCR",
                document.filename,
                image.width(),
                image.height()
            );
            let text = self.ocr.recognize_image(&image)?;
            return Ok(document.with_pages(vec![text], TextSource::ImageOcr));
        }

        Err(PdfError::Parse(format!(
            "{} is neither a PDF nor a supported image",
            document.filename
        ))
        .into())
    }

    fn acquire_pdf(&self, document: Document) -> Result<Document> {
        let extractor = PdfExtractor::from_bytes(&document.bytes)?;
        let pages = extractor.extract_page_texts()?;
        let layer_len = pages
            .iter()
            .map(|p| p.trim().chars().count())
            .sum::<usize>();

        if layer_len >= self.min_text_length {
            debug!(
                "{}: {} chars of text layer across {} pages",
                document.filename,
                layer_len,
                pages.len()
            );
            return Ok(document.with_pages(pages, TextSource::TextLayer));
        }

        info!(
            "{}: text layer has {} chars (< {}), falling back to OCR via {}",
            document.filename,
            layer_len,
            self.min_text_length,
            self.ocr.name()
        );

        let ocr_pages = self.ocr.recognize_pdf(&document.bytes, self.max_pages)?;
        if ocr_pages.iter().all(|p| p.trim().is_empty()) {
            warn!("{}: OCR recognized no text", document.filename);
        }

        Ok(document.with_pages(ocr_pages, TextSource::Ocr))
    }
}
