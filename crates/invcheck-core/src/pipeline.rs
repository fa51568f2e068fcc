//! End-to-end analysis of one uploaded file.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::acquisition::TextAcquirer;
use crate::error::Result;
use crate::extract::FieldExtractor;
use crate::models::analysis::{AnalysisResult, Document, FieldMatch};
use crate::models::config::InvcheckConfig;
use crate::ocr::{OcrBackend, TesseractBackend};
use crate::verify::VerificationRules;

/// Acquisition, extraction and verification wired together.
///
/// Holds no per-request state, so one analyzer can be shared across
/// threads behind an `Arc`.
pub struct InvoiceAnalyzer {
    config: InvcheckConfig,
    acquirer: TextAcquirer,
    extractor: FieldExtractor,
    rules: VerificationRules,
}

impl InvoiceAnalyzer {
    /// Build an analyzer with the given OCR backend.
    pub fn new(config: InvcheckConfig, ocr: Arc<dyn OcrBackend>) -> Result<Self> {
        let extractor = FieldExtractor::new(&config.extraction)?;
        let acquirer = TextAcquirer::new(&config.pdf, ocr);
        let rules = VerificationRules::new(&config.verification);

        Ok(Self {
            config,
            acquirer,
            extractor,
            rules,
        })
    }

    /// Build an analyzer that OCRs through the tesseract CLI.
    pub fn with_tesseract(config: InvcheckConfig) -> Result<Self> {
        let ocr = TesseractBackend::new(&config.ocr, config.pdf.render_dpi);
        Self::new(config, Arc::new(ocr))
    }

    pub fn config(&self) -> &InvcheckConfig {
        &self.config
    }

    /// Analyze raw upload bytes.
    ///
    /// Fails only when no text can be acquired; fields that cannot be
    /// located come back as "not found".
    pub fn analyze(&self, filename: &str, bytes: Vec<u8>) -> Result<AnalysisResult> {
        let start = Instant::now();
        let document = self.acquirer.acquire(Document::new(filename, bytes))?;
        let result = self.analyze_document(&document);

        info!(
            "Analyzed {} ({}, {} pages) in {}ms",
            filename,
            document.source,
            document.pages.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Extract and verify fields of a document whose text is already known.
    pub fn analyze_document(&self, document: &Document) -> AnalysisResult {
        let fields = self.extractor.extract(&document.pages);
        let verification = {
            let v = &self.config.verification;
            self.rules.evaluate(
                lookup(&fields, &v.currency_field),
                lookup(&fields, &v.bank_field),
                lookup(&fields, &v.beneficiary_field),
            )
        };

        AnalysisResult::new(
            document.filename.clone(),
            fields,
            verification,
            document.source,
        )
    }
}

fn lookup<'a>(fields: &'a [(String, FieldMatch)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, m)| m.value.as_deref())
}
