//! Per-request data: documents, field matches and the aggregate result.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel written in place of a value that could not be located.
pub const NOT_FOUND: &str = "not found";

/// Which extraction tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Direct regex capture on a line.
    Regex,
    /// Keyword line followed by the value on the next line.
    Lookahead,
    /// Partial-ratio match on a fixed-size text window.
    Fuzzy,
    /// No tier matched.
    NotFound,
}

/// Result of locating one field in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    /// Extracted value, `None` when not found.
    pub value: Option<String>,

    /// Match certainty, 0-100.
    pub confidence: u8,

    /// Tier that produced the value.
    pub tier: MatchTier,

    /// Label of the candidate pattern that matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldMatch {
    /// A field no tier could locate.
    pub fn not_found() -> Self {
        Self {
            value: None,
            confidence: 0,
            tier: MatchTier::NotFound,
            pattern: None,
        }
    }

    pub fn new(value: impl Into<String>, confidence: u8, tier: MatchTier, pattern: &str) -> Self {
        Self {
            value: Some(value.into()),
            confidence: confidence.min(100),
            tier,
            pattern: Some(pattern.to_string()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    /// Value or the `"not found"` sentinel.
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or(NOT_FOUND)
    }
}

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded PDF text layer.
    TextLayer,
    /// OCR of rendered PDF pages.
    Ocr,
    /// OCR of an uploaded image.
    ImageOcr,
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextSource::TextLayer => "text_layer",
            TextSource::Ocr => "ocr",
            TextSource::ImageOcr => "image_ocr",
        };
        f.write_str(s)
    }
}

/// One uploaded file and the text derived from it.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename as uploaded.
    pub filename: String,
    /// Raw upload bytes.
    pub bytes: Vec<u8>,
    /// Full text, pages joined by newline.
    pub text: Option<String>,
    /// Per-page text blocks in page order.
    pub pages: Vec<String>,
    /// Origin of `text`.
    pub source: TextSource,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            text: None,
            pages: Vec::new(),
            source: TextSource::TextLayer,
        }
    }

    /// Attach acquired page texts.
    pub fn with_pages(mut self, pages: Vec<String>, source: TextSource) -> Self {
        self.text = Some(pages.join("\n"));
        self.pages = pages;
        self.source = source;
        self
    }
}

/// Outcome of a single verification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "not confirmed")]
    NotConfirmed,
}

impl VerificationStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            VerificationStatus::Confirmed
        } else {
            VerificationStatus::NotConfirmed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Confirmed => "confirmed",
            VerificationStatus::NotConfirmed => "not confirmed",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Beneficiary vs. seal name comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealCheck {
    /// Token-sort similarity, 0-100.
    pub similarity: u8,
    /// Similarity fell below the configured threshold.
    pub discrepancy: bool,
}

/// Results of all verification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Currency/bank-origin rule.
    pub currency: VerificationStatus,
    /// Suspicious-bank rule.
    pub bank: VerificationStatus,
    /// Seal similarity, `None` when no company name is configured.
    pub seal: Option<SealCheck>,
}

/// Everything produced for one uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    filename: String,
    fields: Vec<(String, FieldMatch)>,
    verification: VerificationOutcome,
    text_source: TextSource,
}

impl AnalysisResult {
    pub fn new(
        filename: impl Into<String>,
        fields: Vec<(String, FieldMatch)>,
        verification: VerificationOutcome,
        text_source: TextSource,
    ) -> Self {
        Self {
            filename: filename.into(),
            fields,
            verification,
            text_source,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Field matches in configured order.
    pub fn fields(&self) -> &[(String, FieldMatch)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMatch> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Value of a field, `None` when missing or not configured.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|m| m.value.as_deref())
    }

    pub fn verification(&self) -> &VerificationOutcome {
        &self.verification
    }

    pub fn text_source(&self) -> TextSource {
        self.text_source
    }

    /// Fields whose confidence is below `threshold`, with their scores.
    pub fn weak_fields(&self, threshold: u8) -> Vec<(&str, u8)> {
        self.fields
            .iter()
            .filter(|(_, m)| m.confidence < threshold)
            .map(|(n, m)| (n.as_str(), m.confidence))
            .collect()
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("filename", &self.filename)?;
        for (name, m) in &self.fields {
            map.serialize_entry(name, m.display_value())?;
        }
        map.serialize_entry(
            "discrepancy_with_seal",
            &self.verification.seal.map(|s| s.discrepancy),
        )?;
        map.serialize_entry(
            "similarity_percentage",
            &self.verification.seal.map(|s| s.similarity),
        )?;
        map.serialize_entry("verification_currency", &self.verification.currency)?;
        map.serialize_entry("verification_bank", &self.verification.bank)?;

        let confidence: BTreeMap<&str, u8> = self
            .fields
            .iter()
            .map(|(n, m)| (n.as_str(), m.confidence))
            .collect();
        map.serialize_entry("confidence", &confidence)?;
        map.serialize_entry("text_source", &self.text_source)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> AnalysisResult {
        AnalysisResult::new(
            "inv.pdf",
            vec![
                (
                    "beneficiary".to_string(),
                    FieldMatch::new("Acme Corp", 100, MatchTier::Regex, "beneficiary name"),
                ),
                ("swift_code".to_string(), FieldMatch::not_found()),
            ],
            VerificationOutcome {
                currency: VerificationStatus::Confirmed,
                bank: VerificationStatus::NotConfirmed,
                seal: None,
            },
            TextSource::TextLayer,
        )
    }

    #[test]
    fn test_missing_fields_serialize_as_sentinel() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["filename"], "inv.pdf");
        assert_eq!(json["beneficiary"], "Acme Corp");
        assert_eq!(json["swift_code"], "not found");
        assert_eq!(json["confidence"]["swift_code"], 0);
        assert_eq!(json["confidence"]["beneficiary"], 100);
        assert_eq!(json["verification_currency"], "confirmed");
        assert_eq!(json["verification_bank"], "not confirmed");
        assert!(json["discrepancy_with_seal"].is_null());
        assert!(json["similarity_percentage"].is_null());
        assert_eq!(json["text_source"], "text_layer");
    }

    #[test]
    fn test_weak_fields() {
        let result = sample();
        assert_eq!(result.weak_fields(70), vec![("swift_code", 0)]);
        assert_eq!(result.value("beneficiary"), Some("Acme Corp"));
        assert_eq!(result.value("bank_name"), None);
    }

    #[test]
    fn test_with_pages_joins_text() {
        let doc = Document::new("a.pdf", Vec::new()).with_pages(
            vec!["  Seller: X \n\n".to_string(), "\nBank: Y".to_string()],
            TextSource::Ocr,
        );
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.source, TextSource::Ocr);
        assert_eq!(doc.text.as_deref(), Some("  Seller: X \n\n\n\nBank: Y"));
    }
}
