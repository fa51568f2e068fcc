//! Output renderings of an analysis result.

use invcheck_core::models::analysis::{AnalysisResult, VerificationStatus};

/// Output format for a single result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// HTML table
    Html,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn render(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Html => Ok(to_html(result)),
        OutputFormat::Csv => to_csv(result),
        OutputFormat::Text => Ok(to_text(result)),
    }
}

/// Flattened key/value rows: fields first, then verification outcomes.
fn rows(result: &AnalysisResult) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = result
        .fields()
        .iter()
        .map(|(name, m)| (name.clone(), m.display_value().to_string()))
        .collect();

    let verification = result.verification();
    rows.push((
        "verification_currency".to_string(),
        verification.currency.to_string(),
    ));
    rows.push(("verification_bank".to_string(), verification.bank.to_string()));
    if let Some(seal) = verification.seal {
        rows.push(("similarity_percentage".to_string(), seal.similarity.to_string()));
        rows.push((
            "discrepancy_with_seal".to_string(),
            seal.discrepancy.to_string(),
        ));
    }
    rows
}

pub fn to_html(result: &AnalysisResult) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Invoice analysis</title></head>\n<body>\n",
    );
    html.push_str(&format!(
        "<h2>{}</h2>\n<p>Text source: {}</p>\n<table border=\"1\">\n<tr><th>Field</th><th>Value</th><th>Confidence</th></tr>\n",
        escape_html(result.filename()),
        result.text_source()
    ));

    let field_count = result.fields().len();
    for (i, (name, value)) in rows(result).into_iter().enumerate() {
        let confidence = result
            .fields()
            .get(i)
            .map(|(_, m)| format!("{}%", m.confidence))
            .unwrap_or_default();
        let flagged = i >= field_count && (value == "not confirmed" || value == "true");
        html.push_str(&format!(
            "<tr{}><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            if flagged { " class=\"warn\"" } else { "" },
            escape_html(&name),
            escape_html(&value),
            confidence
        ));
    }

    html.push_str("</table>\n<p><a href=\"/\">Analyze another file</a></p>\n</body>\n</html>\n");
    html
}

pub fn to_csv(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let rows = rows(result);

    let mut header = vec!["filename".to_string()];
    header.extend(rows.iter().map(|(k, _)| k.clone()));
    header.push("text_source".to_string());
    wtr.write_record(&header)?;

    let mut record = vec![result.filename().to_string()];
    record.extend(rows.into_iter().map(|(_, v)| v));
    record.push(result.text_source().to_string());
    wtr.write_record(&record)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn to_text(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", result.filename()));
    output.push_str(&format!("Text source: {}\n\n", result.text_source()));

    output.push_str("Fields:\n");
    for (name, m) in result.fields() {
        output.push_str(&format!(
            "  {:<16} {} ({}%)\n",
            name,
            m.display_value(),
            m.confidence
        ));
    }

    let verification = result.verification();
    output.push_str("\nVerification:\n");
    output.push_str(&format!("  Currency: {}\n", verification.currency));
    output.push_str(&format!("  Bank:     {}\n", verification.bank));
    if let Some(seal) = verification.seal {
        output.push_str(&format!(
            "  Seal:     {}% similar{}\n",
            seal.similarity,
            if seal.discrepancy { " (discrepancy)" } else { "" }
        ));
    }

    output
}

/// Whether every verification rule passed.
pub fn all_confirmed(result: &AnalysisResult) -> bool {
    let v = result.verification();
    v.currency == VerificationStatus::Confirmed
        && v.bank == VerificationStatus::Confirmed
        && !v.seal.is_some_and(|s| s.discrepancy)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use invcheck_core::models::analysis::{
        FieldMatch, MatchTier, SealCheck, TextSource, VerificationOutcome,
    };
    use pretty_assertions::assert_eq;

    fn sample() -> AnalysisResult {
        AnalysisResult::new(
            "a<b>.pdf",
            vec![
                (
                    "beneficiary".to_string(),
                    FieldMatch::new("Smith & Sons", 100, MatchTier::Regex, "seller"),
                ),
                ("swift_code".to_string(), FieldMatch::not_found()),
            ],
            VerificationOutcome {
                currency: VerificationStatus::Confirmed,
                bank: VerificationStatus::NotConfirmed,
                seal: Some(SealCheck {
                    similarity: 42,
                    discrepancy: true,
                }),
            },
            TextSource::Ocr,
        )
    }

    #[test]
    fn test_html_is_escaped() {
        let html = to_html(&sample());
        assert!(html.contains("<h2>a&lt;b&gt;.pdf</h2>"));
        assert!(html.contains("<td>Smith &amp; Sons</td><td>100%</td>"));
        assert!(html.contains("<td>swift_code</td><td>not found</td><td>0%</td>"));
        assert!(html.contains("<tr class=\"warn\"><td>verification_bank</td>"));
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let csv = to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "filename,beneficiary,swift_code,verification_currency,verification_bank,similarity_percentage,discrepancy_with_seal,text_source"
        );
        assert_eq!(
            lines[1],
            "a<b>.pdf,Smith & Sons,not found,confirmed,not confirmed,42,true,ocr"
        );
    }

    #[test]
    fn test_text_summary() {
        let text = to_text(&sample());
        assert!(text.contains("File: a<b>.pdf"));
        assert!(text.contains("Bank:     not confirmed"));
        assert!(text.contains("Seal:     42% similar (discrepancy)"));
        assert!(!all_confirmed(&sample()));
    }

    #[test]
    fn test_json_is_flat() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&sample(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["beneficiary"], "Smith & Sons");
        assert_eq!(json["discrepancy_with_seal"], true);
        assert_eq!(json["similarity_percentage"], 42);
    }
}
