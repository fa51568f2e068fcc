//! Batch command - analyze every file matching a glob pattern.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use invcheck_core::{AnalysisResult, InvoiceAnalyzer};

use crate::render::{self, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of analyzing a single file.
struct FileOutcome {
    path: PathBuf,
    result: Option<AnalysisResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp"];

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to analyze",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let analyzer = InvoiceAnalyzer::with_tesseract(config)?;
    let mut outcomes = Vec::with_capacity(files.len());

    for path in files {
        let file_start = Instant::now();
        let result = analyze_file(&analyzer, &path);
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => outcomes.push(FileOutcome {
                path,
                result: Some(result),
                error: None,
                processing_time_ms,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if !args.continue_on_error {
                    error!("Failed to analyze {}: {}", path.display(), error_msg);
                    pb.abandon();
                    anyhow::bail!("Analysis failed: {}", error_msg);
                }
                warn!("Failed to analyze {}: {}", path.display(), error_msg);
                outcomes.push(FileOutcome {
                    path,
                    result: None,
                    error: Some(error_msg),
                    processing_time_ms,
                });
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if let Some(output_dir) = &args.output_dir {
        for outcome in &outcomes {
            let Some(result) = &outcome.result else {
                continue;
            };
            let stem = outcome
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("invoice");
            let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));

            fs::write(&output_path, render::render(result, args.format)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();
    let flagged = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref())
        .filter(|r| !render::all_confirmed(r))
        .count();

    println!();
    println!(
        "{} Analyzed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} with failed verification",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red(),
        style(flagged).yellow()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn analyze_file(analyzer: &InvoiceAnalyzer, path: &Path) -> anyhow::Result<AnalysisResult> {
    let data = fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    Ok(analyzer.analyze(filename, data)?)
}

/// One row per file: the flat result columns of the first success, then
/// status, timing and error.
fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let columns: Vec<String> = outcomes
        .iter()
        .find_map(|o| o.result.as_ref())
        .map(summary_columns)
        .unwrap_or_default();

    let mut header = vec!["filename".to_string(), "status".to_string()];
    header.extend(columns.iter().cloned());
    header.extend(["processing_time_ms".to_string(), "error".to_string()]);
    wtr.write_record(&header)?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let mut record = vec![filename];
        match &outcome.result {
            Some(result) => {
                record.push("success".to_string());
                let flat = serde_json::to_value(result)?;
                record.extend(columns.iter().map(|c| json_cell(flat.get(c))));
            }
            None => {
                record.push("error".to_string());
                record.extend(columns.iter().map(|_| String::new()));
            }
        }
        record.push(outcome.processing_time_ms.to_string());
        record.push(outcome.error.clone().unwrap_or_default());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn summary_columns(result: &AnalysisResult) -> Vec<String> {
    let mut columns: Vec<String> = result.fields().iter().map(|(n, _)| n.clone()).collect();
    columns.extend(
        [
            "verification_currency",
            "verification_bank",
            "similarity_percentage",
            "discrepancy_with_seal",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    columns
}

fn json_cell(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a/invoice.PDF")));
        assert!(is_supported(Path::new("scan.jpeg")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_json_cell() {
        assert_eq!(json_cell(Some(&serde_json::json!("USD"))), "USD");
        assert_eq!(json_cell(Some(&serde_json::json!(42))), "42");
        assert_eq!(json_cell(Some(&serde_json::json!(true))), "true");
        assert_eq!(json_cell(None), "");
    }
}
