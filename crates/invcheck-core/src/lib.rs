//! Core library for invoice payment-detail checks.
//!
//! This crate provides:
//! - PDF text-layer extraction with an OCR fallback for scanned documents
//! - Field extraction (regex capture, next-line lookahead, fuzzy windows)
//! - Verification rules over the extracted bank and currency details
//! - The [`InvoiceAnalyzer`] pipeline tying them together

pub mod acquisition;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod verify;

pub use acquisition::TextAcquirer;
pub use error::{InvcheckError, Result};
pub use extract::FieldExtractor;
pub use models::analysis::{AnalysisResult, Document, FieldMatch, MatchTier, TextSource};
pub use models::config::InvcheckConfig;
pub use ocr::{OcrBackend, TesseractBackend};
pub use pdf::{PdfExtractor, PdfProcessor};
pub use pipeline::InvoiceAnalyzer;
pub use verify::VerificationRules;
