//! Per-kind cleanup of raw captures.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{CURRENCY_TOKEN, NUMBER, SWIFT_CODE, WHITESPACE};
use crate::models::fields::ValueKind;

/// Clean up a raw capture for a field of `kind`.
///
/// Returns `None` when the capture holds nothing usable for that kind, in
/// which case the extractor keeps looking.
pub fn normalize_value(kind: ValueKind, raw: &str, known_currencies: &[String]) -> Option<String> {
    match kind {
        ValueKind::Text => clean_text(raw),
        ValueKind::Amount => {
            let number = NUMBER.find(raw)?;
            parse_amount(number.as_str()).map(|d| d.to_string())
        }
        ValueKind::Code => normalize_swift(raw),
        ValueKind::Account => normalize_account(raw),
        ValueKind::Currency => normalize_currency(raw, known_currencies),
    }
}

fn clean_text(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ");
    let cleaned = collapsed.trim_end_matches([',', ';']).trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Parse an amount written with either `,` or `.` as decimal separator
/// (e.g. "12,345.67", "12.345,67", "1 234,56").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Whichever separator comes last is the decimal one
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if decimals == 2 && cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// Uppercase and validate a SWIFT/BIC code.
pub fn normalize_swift(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();

    let joined: String = upper.chars().filter(|c| !c.is_whitespace()).collect();
    if SWIFT_CODE.is_match(&joined) {
        return Some(joined);
    }

    upper
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|t| SWIFT_CODE.is_match(t))
        .map(str::to_string)
}

fn normalize_account(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw)?;
    let cleaned = cleaned.trim_end_matches(|c: char| !c.is_alphanumeric());
    let digits = cleaned.chars().filter(|c| c.is_ascii_digit()).count();
    if digits >= 4 {
        Some(cleaned.to_string())
    } else {
        None
    }
}

fn normalize_currency(raw: &str, known: &[String]) -> Option<String> {
    let upper = raw.to_uppercase();
    CURRENCY_TOKEN
        .find_iter(&upper)
        .map(|m| match m.as_str() {
            "RMB" => "CNY",
            code => code,
        })
        .find(|code| known.iter().any(|k| k.eq_ignore_ascii_case(code)))
        .map(str::to_string)
}
