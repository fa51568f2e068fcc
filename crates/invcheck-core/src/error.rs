//! Error types for the invcheck-core library.

use thiserror::Error;

/// Main error type for the invcheck library.
#[derive(Error, Debug)]
pub enum InvcheckError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Extractor construction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The bytes could not be opened as a PDF.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from the text layer.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to page rendering and OCR.
#[derive(Error, Debug)]
pub enum OcrError {
    /// An external tool could not be started.
    #[error("failed to run {tool}: {reason}")]
    Spawn { tool: String, reason: String },

    /// An external tool exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// An external tool ran past the configured timeout.
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Rendering pages to images failed.
    #[error("page rendering failed: {0}")]
    Render(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),
}

/// Errors raised while building a field extractor.
///
/// Extraction itself never fails; a field that cannot be located is a
/// `FieldMatch::not_found()`.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A candidate pattern did not compile.
    #[error("invalid pattern for {field} ({label}): {reason}")]
    InvalidPattern {
        field: String,
        label: String,
        reason: String,
    },

    /// The field table is unusable.
    #[error("invalid field table: {0}")]
    InvalidFields(String),
}

/// Result type for the invcheck library.
pub type Result<T> = std::result::Result<T, InvcheckError>;
