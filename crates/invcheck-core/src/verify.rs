//! Rule-based verification of extracted payment details.

use tracing::debug;

use crate::extract::{normalize, token_sort_ratio};
use crate::models::analysis::{SealCheck, VerificationOutcome, VerificationStatus};
use crate::models::config::VerificationConfig;

/// Fixed rule set evaluated over already-extracted fields.
pub struct VerificationRules {
    origin_currency: String,
    required_origin: String,
    suspicious_banks: Vec<String>,
    expected_company: Option<String>,
    seal_threshold: u8,
}

impl VerificationRules {
    /// Build the rules, normalizing list entries once up front.
    pub fn new(config: &VerificationConfig) -> Self {
        Self {
            origin_currency: config.origin_currency.trim().to_uppercase(),
            required_origin: compact(&config.required_bank_origin),
            suspicious_banks: config
                .suspicious_banks
                .iter()
                .map(|b| compact(b))
                .filter(|b| !b.is_empty())
                .collect(),
            expected_company: config
                .expected_company
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            seal_threshold: config.seal_threshold,
        }
    }

    /// Currency/origin rule: the origin currency must be paid into a bank
    /// whose name carries the required origin.
    pub fn check_currency(&self, currency: Option<&str>, bank_name: Option<&str>) -> VerificationStatus {
        let Some(currency) = currency else {
            return VerificationStatus::Confirmed;
        };
        if !currency.trim().eq_ignore_ascii_case(&self.origin_currency) {
            return VerificationStatus::Confirmed;
        }

        let bank = bank_name.map(compact).unwrap_or_default();
        VerificationStatus::from_passed(bank.contains(&self.required_origin))
    }

    /// Suspicious-bank rule: no listed bank may appear in the bank name.
    pub fn check_bank(&self, bank_name: Option<&str>) -> VerificationStatus {
        let Some(bank) = bank_name.map(compact) else {
            return VerificationStatus::Confirmed;
        };

        match self.suspicious_banks.iter().find(|s| bank.contains(s.as_str())) {
            Some(hit) => {
                debug!("Bank '{}' matches suspicious entry '{}'", bank, hit);
                VerificationStatus::NotConfirmed
            }
            None => VerificationStatus::Confirmed,
        }
    }

    /// Seal similarity; `None` when no company name is configured.
    pub fn check_seal(&self, beneficiary: Option<&str>) -> Option<SealCheck> {
        let expected = self.expected_company.as_deref()?;
        let similarity = beneficiary
            .map(|b| token_sort_ratio(b, expected))
            .unwrap_or(0);

        Some(SealCheck {
            similarity,
            discrepancy: similarity < self.seal_threshold,
        })
    }

    /// Evaluate every rule.
    pub fn evaluate(
        &self,
        currency: Option<&str>,
        bank_name: Option<&str>,
        beneficiary: Option<&str>,
    ) -> VerificationOutcome {
        VerificationOutcome {
            currency: self.check_currency(currency, bank_name),
            bank: self.check_bank(bank_name),
            seal: self.check_seal(beneficiary),
        }
    }
}

/// Normalized form with all whitespace removed, so hyphenated or
/// differently spaced bank names compare equal.
fn compact(s: &str) -> String {
    normalize(s).split_whitespace().collect()
}
