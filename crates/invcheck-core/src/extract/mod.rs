//! Field extraction: regex capture, next-line lookahead, fuzzy windows.
//!
//! Every field is resolved independently against the whole document. The
//! tiers run in order and the first one producing a usable value wins:
//!
//! 1. regex capture on a line (confidence 100)
//! 2. keyword alone on a line, value taken from the next non-blank line
//! 3. partial-ratio match of the keyword against fixed-size text windows
//!
//! Within a tier, candidate order decides before line order.

mod patterns;
pub mod similarity;
pub mod values;

pub use similarity::{normalize, partial_ratio, ratio, token_sort_ratio};
pub use values::{normalize_value, parse_amount};

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, trace};

use crate::error::ExtractionError;
use crate::models::analysis::{FieldMatch, MatchTier};
use crate::models::config::ExtractionConfig;
use crate::models::fields::{CandidatePattern, ExtractionField, ValueKind};

/// Result type for extractor construction.
pub type Result<T> = std::result::Result<T, ExtractionError>;

struct CompiledPattern {
    label: String,
    label_re: Regex,
    value_re: Regex,
    fuzzy_label: String,
}

/// Fixed-size character windows over the whole document, with their
/// normalized forms for fuzzy scoring.
struct Windows {
    raw: Vec<String>,
    normalized: Vec<String>,
}

impl Windows {
    fn new(text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let raw: Vec<String> = chars.chunks(size).map(|w| w.iter().collect()).collect();
        let normalized = raw.iter().map(|w| normalize(w)).collect();
        Self { raw, normalized }
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw
            .iter()
            .map(String::as_str)
            .zip(self.normalized.iter().map(String::as_str))
    }
}

struct CompiledField {
    name: String,
    kind: ValueKind,
    patterns: Vec<CompiledPattern>,
}

/// Rule-based field extractor built from an immutable field table.
pub struct FieldExtractor {
    fields: Vec<CompiledField>,
    fuzzy_threshold: u8,
    window_size: usize,
    lookahead_confidence: u8,
    known_currencies: Vec<String>,
}

impl FieldExtractor {
    /// Compile every candidate pattern of the configured fields.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(config.fields.len());

        for field in &config.fields {
            if field.name.trim().is_empty() {
                return Err(ExtractionError::InvalidFields("field with empty name".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ExtractionError::InvalidFields(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
            fields.push(compile_field(field)?);
        }

        if config.window_size == 0 {
            return Err(ExtractionError::InvalidFields(
                "window_size must be positive".to_string(),
            ));
        }

        debug!("Compiled {} extraction fields", fields.len());

        Ok(Self {
            fields,
            fuzzy_threshold: config.fuzzy_threshold,
            window_size: config.window_size,
            lookahead_confidence: config.lookahead_confidence,
            known_currencies: config.known_currencies.clone(),
        })
    }

    /// Extract every field from plain text.
    pub fn extract_text(&self, text: &str) -> Vec<(String, FieldMatch)> {
        self.extract(&[text.to_string()])
    }

    /// Extract every field from text blocks (one per page).
    ///
    /// Lookahead never crosses a block boundary; the fuzzy tier sees the
    /// blocks joined by newlines.
    pub fn extract(&self, blocks: &[String]) -> Vec<(String, FieldMatch)> {
        let lines: Vec<Vec<&str>> = blocks
            .iter()
            .map(|b| b.lines().map(str::trim).filter(|l| !l.is_empty()).collect())
            .collect();
        let windows = Windows::new(&blocks.join("\n"), self.window_size);

        self.fields
            .iter()
            .map(|field| {
                let m = self.extract_field(field, &lines, &windows);
                debug!(
                    field = %field.name,
                    tier = ?m.tier,
                    confidence = m.confidence,
                    "Resolved field"
                );
                (field.name.clone(), m)
            })
            .collect()
    }

    fn extract_field(&self, field: &CompiledField, lines: &[Vec<&str>], windows: &Windows) -> FieldMatch {
        self.regex_tier(field, lines)
            .or_else(|| self.lookahead_tier(field, lines))
            .or_else(|| self.fuzzy_tier(field, windows))
            .unwrap_or_else(FieldMatch::not_found)
    }

    fn regex_tier(&self, field: &CompiledField, lines: &[Vec<&str>]) -> Option<FieldMatch> {
        for pattern in &field.patterns {
            for line in lines.iter().flatten() {
                for caps in pattern.value_re.captures_iter(line) {
                    let raw = caps
                        .name("value")
                        .or_else(|| caps.get(1))
                        .map(|m| m.as_str())
                        .unwrap_or_default();

                    if let Some(value) = self.clean(field.kind, raw) {
                        trace!("{}: regex '{}' matched line '{}'", field.name, pattern.label, line);
                        return Some(FieldMatch::new(value, 100, MatchTier::Regex, &pattern.label));
                    }
                }
            }
        }
        None
    }

    fn lookahead_tier(&self, field: &CompiledField, lines: &[Vec<&str>]) -> Option<FieldMatch> {
        for pattern in &field.patterns {
            for block in lines {
                for (i, line) in block.iter().enumerate() {
                    let Some(m) = pattern.label_re.find(line) else {
                        continue;
                    };

                    let rest = line[m.end()..]
                        .trim_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());
                    if !rest.is_empty() {
                        continue;
                    }

                    let Some(next) = block.get(i + 1) else {
                        continue;
                    };

                    if let Some(value) = self.clean(field.kind, next) {
                        trace!("{}: label '{}' alone on a line, using next line", field.name, pattern.label);
                        return Some(FieldMatch::new(
                            value,
                            self.lookahead_confidence,
                            MatchTier::Lookahead,
                            &pattern.label,
                        ));
                    }
                }
            }
        }
        None
    }

    fn fuzzy_tier(&self, field: &CompiledField, windows: &Windows) -> Option<FieldMatch> {
        for pattern in &field.patterns {
            if pattern.fuzzy_label.is_empty() {
                continue;
            }

            for (window, norm) in windows.iter() {
                let score = partial_ratio(&pattern.fuzzy_label, norm);
                if score < self.fuzzy_threshold {
                    continue;
                }

                if let Some(value) = self.clean(field.kind, window) {
                    trace!("{}: fuzzy '{}' scored {}", field.name, pattern.label, score);
                    return Some(FieldMatch::new(value, score.min(99), MatchTier::Fuzzy, &pattern.label));
                }
            }
        }
        None
    }

    fn clean(&self, kind: ValueKind, raw: &str) -> Option<String> {
        normalize_value(kind, raw, &self.known_currencies)
    }
}

fn compile_field(field: &ExtractionField) -> Result<CompiledField> {
    let patterns = field
        .patterns
        .iter()
        .map(|p| compile_pattern(field, p))
        .collect::<Result<Vec<_>>>()?;

    Ok(CompiledField {
        name: field.name.clone(),
        kind: field.kind,
        patterns,
    })
}

fn compile_pattern(field: &ExtractionField, pattern: &CandidatePattern) -> Result<CompiledPattern> {
    let invalid = |reason: String| ExtractionError::InvalidPattern {
        field: field.name.clone(),
        label: pattern.label.clone(),
        reason,
    };

    let label = label_regex(&pattern.label);
    if label.is_empty() {
        return Err(invalid("empty label".to_string()));
    }

    let label_re = Regex::new(&format!("(?i){}", label)).map_err(|e| invalid(e.to_string()))?;

    let value_source = match &pattern.regex {
        Some(custom) => format!("(?i){}", custom),
        None => {
            let separator = if pattern.require_separator { r"[:\-]" } else { r"[:\-]?" };
            format!(
                r"(?i){}\s*{}\s*(?P<value>{})",
                label,
                separator,
                field.kind.default_fragment()
            )
        }
    };
    let value_re = Regex::new(&value_source).map_err(|e| invalid(e.to_string()))?;

    if value_re.captures_len() < 2 {
        return Err(invalid("pattern has no capture group".to_string()));
    }

    Ok(CompiledPattern {
        label: pattern.label.clone(),
        label_re,
        value_re,
        fuzzy_label: normalize(&pattern.label),
    })
}

/// Regex source matching a literal keyword.
///
/// Whitespace runs match any whitespace, apostrophes match straight and
/// curly forms, and word boundaries are added at alphanumeric ends.
fn label_regex(label: &str) -> String {
    let label = label.trim();
    let mut out = String::new();
    let mut in_space = false;

    for c in label.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push_str(r"\s+");
                in_space = true;
            }
            continue;
        }
        in_space = false;

        match c {
            '\'' | '’' => out.push_str("['’]"),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    if out.is_empty() {
        return out;
    }

    let starts_word = label.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = label.chars().last().is_some_and(char::is_alphanumeric);

    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        out,
        if ends_word { r"\b" } else { "" }
    )
}
