//! Common regex patterns used to clean up captured values.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// First number in a capture, with thousands/decimal separators.
    pub static ref NUMBER: Regex = Regex::new(
        r"\d{1,3}(?:[ \u{00a0}]\d{3})+(?:[.,]\d+)?|\d[\d,.]*\d|\d"
    ).unwrap();

    /// SWIFT/BIC: bank (4) + country (2) + location (2) + optional branch (3).
    pub static ref SWIFT_CODE: Regex = Regex::new(
        r"^[A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?$"
    ).unwrap();

    /// Three-letter uppercase token.
    pub static ref CURRENCY_TOKEN: Regex = Regex::new(
        r"\b[A-Z]{3}\b"
    ).unwrap();

    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}
