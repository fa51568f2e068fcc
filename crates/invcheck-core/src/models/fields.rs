//! Field table: which semantic slots to extract and how to find them.

use serde::{Deserialize, Serialize};

/// Shape of the value a field holds.
///
/// The kind decides the default value fragment used when a candidate is a
/// bare keyword, and how raw captures are cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Free text (names, addresses).
    Text,
    /// Monetary amount, printed as a canonical decimal.
    Amount,
    /// SWIFT/BIC code.
    Code,
    /// Bank account number or IBAN.
    Account,
    /// ISO currency code.
    Currency,
}

impl ValueKind {
    /// Regex fragment placed inside the `value` group of composed patterns.
    pub fn default_fragment(&self) -> &'static str {
        match self {
            ValueKind::Text => r"[^:\-\s].*",
            ValueKind::Amount => r"[A-Z$€£¥]{0,3}\s*\d[\d,.\s]*",
            ValueKind::Code => r"[A-Z]{4}\s?[A-Z]{2}\s?[A-Z0-9]{2}(?:\s?[A-Z0-9]{3})?\b",
            ValueKind::Account => r"[A-Z0-9][A-Z0-9 /\-]{3,}",
            ValueKind::Currency => r"[A-Z]{3}\b",
        }
    }
}

/// One way of locating a field in text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePattern {
    /// Literal keyword, e.g. `"account number"`.
    pub label: String,

    /// Full regex overriding the composed one. Must contain a `value` group
    /// or at least one capture group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Require a `:` or `-` between label and value.
    #[serde(default)]
    pub require_separator: bool,
}

impl CandidatePattern {
    /// Candidate from a bare keyword.
    pub fn keyword(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            regex: None,
            require_separator: false,
        }
    }

    /// Candidate with an explicit regex.
    pub fn regex(label: impl Into<String>, regex: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            regex: Some(regex.into()),
            require_separator: false,
        }
    }

    /// Require a separator after the label.
    pub fn with_separator(mut self) -> Self {
        self.require_separator = true;
        self
    }
}

/// A semantic slot to extract, with its candidates in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionField {
    /// Output key, e.g. `"swift_code"`.
    pub name: String,

    /// Value shape.
    pub kind: ValueKind,

    /// Candidates; earlier entries win ties.
    pub patterns: Vec<CandidatePattern>,
}

impl ExtractionField {
    pub fn new(name: impl Into<String>, kind: ValueKind, patterns: Vec<CandidatePattern>) -> Self {
        Self {
            name: name.into(),
            kind,
            patterns,
        }
    }
}

/// Built-in field table for payment-detail invoices.
pub fn default_fields() -> Vec<ExtractionField> {
    use CandidatePattern as P;

    vec![
        ExtractionField::new(
            "beneficiary",
            ValueKind::Text,
            vec![
                P::keyword("beneficiary's name"),
                P::keyword("beneficiary name"),
                P::keyword("seller"),
                P::keyword("company name"),
            ],
        ),
        ExtractionField::new(
            "total_amount",
            ValueKind::Amount,
            vec![
                P::keyword("total amount"),
                P::keyword("amount"),
                P::keyword("total"),
            ],
        ),
        ExtractionField::new(
            "currency",
            ValueKind::Currency,
            vec![
                P::keyword("currency"),
                P::regex("usd", r"\b(?P<value>USD)\b"),
                P::regex("eur", r"\b(?P<value>EUR)\b"),
                P::regex("jpy", r"\b(?P<value>JPY)\b"),
                P::regex("gbp", r"\b(?P<value>GBP)\b"),
                P::regex("cny", r"\b(?P<value>CNY|RMB)\b"),
            ],
        ),
        ExtractionField::new(
            "bank_name",
            ValueKind::Text,
            vec![
                P::keyword("beneficiary's bank"),
                P::keyword("bank name"),
                P::keyword("bank information").with_separator(),
                P::keyword("banking information").with_separator(),
                P::keyword("bank").with_separator(),
            ],
        ),
        ExtractionField::new(
            "bank_address",
            ValueKind::Text,
            vec![
                P::keyword("bank address"),
                P::keyword("address").with_separator(),
                P::keyword("add").with_separator(),
            ],
        ),
        ExtractionField::new(
            "swift_code",
            ValueKind::Code,
            vec![
                P::keyword("swift code"),
                P::keyword("swift"),
                P::keyword("bic"),
            ],
        ),
        ExtractionField::new(
            "account_number",
            ValueKind::Account,
            vec![
                P::keyword("account no."),
                P::keyword("account number"),
                P::keyword("a/c no"),
                P::keyword("account no"),
                P::keyword("iban"),
            ],
        ),
    ]
}
