//! Configuration structures for the analysis pipeline and server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::fields::{default_fields, ExtractionField};
use crate::error::{InvcheckError, Result};

/// Main configuration for invcheck.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvcheckConfig {
    /// PDF text acquisition configuration.
    pub pdf: PdfConfig,

    /// OCR fallback configuration.
    pub ocr: OcrConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Verification rule configuration.
    pub verification: VerificationConfig,

    /// HTTP server and job queue configuration.
    pub server: ServerConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Trimmed text-layer length below which the document is treated as scanned.
    pub min_text_length: usize,

    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// Maximum pages to OCR (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            render_dpi: 200,
            max_pages: 0,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language codes, joined with `+`.
    pub languages: Vec<String>,

    /// Tesseract executable.
    pub tesseract_cmd: String,

    /// Poppler `pdftoppm` executable.
    pub pdftoppm_cmd: String,

    /// Tesseract page segmentation mode.
    pub page_seg_mode: u8,

    /// Convert rendered pages to grayscale before recognition.
    pub grayscale: bool,

    /// Apply adaptive thresholding after grayscale conversion.
    pub binarize: bool,

    /// Longest image side passed to tesseract; larger images are downscaled.
    pub max_image_size: u32,

    /// Upper bound for each external process, in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
            page_seg_mode: 3,
            grayscale: true,
            binarize: false,
            max_image_size: 4000,
            timeout_secs: 120,
        }
    }
}

impl OcrConfig {
    /// Language argument for tesseract (`eng+chi_sim`).
    pub fn language_arg(&self) -> String {
        if self.languages.is_empty() {
            "eng".to_string()
        } else {
            self.languages.join("+")
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum partial-ratio score (0-100) for the fuzzy tier.
    pub fuzzy_threshold: u8,

    /// Fuzzy tier window size, in characters.
    pub window_size: usize,

    /// Confidence assigned to next-line lookahead matches.
    pub lookahead_confidence: u8,

    /// Currency codes recognised by the currency normalizer.
    pub known_currencies: Vec<String>,

    /// Fields to extract, in output order.
    pub fields: Vec<ExtractionField>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 70,
            window_size: 100,
            lookahead_confidence: 80,
            known_currencies: ["USD", "EUR", "JPY", "GBP", "CNY"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fields: default_fields(),
        }
    }
}

/// Verification rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Field holding the currency code.
    pub currency_field: String,

    /// Field holding the bank name.
    pub bank_field: String,

    /// Field holding the beneficiary name.
    pub beneficiary_field: String,

    /// Currency that requires a bank of the expected origin.
    pub origin_currency: String,

    /// Substring the normalized bank name must contain for `origin_currency`.
    pub required_bank_origin: String,

    /// Banks flagged for additional scrutiny.
    pub suspicious_banks: Vec<String>,

    /// Company name on the seal; the seal check is skipped when unset.
    pub expected_company: Option<String>,

    /// Token-sort similarity (0-100) below which the seal is a discrepancy.
    pub seal_threshold: u8,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            currency_field: "currency".to_string(),
            bank_field: "bank_name".to_string(),
            beneficiary_field: "beneficiary".to_string(),
            origin_currency: "USD".to_string(),
            required_bank_origin: "CHINA".to_string(),
            suspicious_banks: vec![
                "HSBC".to_string(),
                "Standard Chartered".to_string(),
                "Citibank".to_string(),
            ],
            expected_company: None,
            seal_threshold: 90,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,

    /// Listen port (the `PORT` environment variable takes precedence).
    pub port: u16,

    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,

    /// Background workers consuming the job queue.
    pub workers: usize,

    /// Jobs that may wait in the queue before uploads are rejected.
    pub queue_capacity: usize,

    /// Directory for background job results.
    pub results_dir: PathBuf,

    /// Append-only log of files with weak or missing fields.
    pub low_confidence_log: PathBuf,

    /// Fields scoring below this are written to the low-confidence log.
    pub low_confidence_threshold: u8,

    /// Finished job records kept for `/jobs/:id`; the oldest are evicted first.
    pub max_job_records: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 20 * 1024 * 1024,
            workers: 2,
            queue_capacity: 16,
            results_dir: PathBuf::from("results"),
            low_confidence_log: PathBuf::from("low_confidence.log"),
            low_confidence_threshold: 70,
            max_job_records: 1000,
        }
    }
}

impl InvcheckConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| InvcheckError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| InvcheckError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Port to listen on, honouring a `PORT` value when it parses.
    pub fn resolve_port(&self, env_port: Option<&str>) -> u16 {
        env_port
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(self.server.port)
    }
}
