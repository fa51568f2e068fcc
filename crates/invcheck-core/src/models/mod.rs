//! Data models for configuration, field tables and analysis results.

pub mod analysis;
pub mod config;
pub mod fields;

pub use analysis::{
    AnalysisResult, Document, FieldMatch, MatchTier, SealCheck, TextSource, VerificationOutcome,
    VerificationStatus, NOT_FOUND,
};
pub use config::{
    ExtractionConfig, InvcheckConfig, OcrConfig, PdfConfig, ServerConfig, VerificationConfig,
};
pub use fields::{default_fields, CandidatePattern, ExtractionField, ValueKind};
