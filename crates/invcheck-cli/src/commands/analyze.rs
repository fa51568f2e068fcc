//! Analyze command - extract payment details from a single file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invcheck_core::InvoiceAnalyzer;

use crate::render::{self, OutputFormat};

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Company name expected on the seal
    #[arg(long)]
    expected_company: Option<String>,

    /// Show per-field confidence scores
    #[arg(long)]
    show_confidence: bool,

    /// Exit with an error when a verification rule fails
    #[arg(long)]
    strict: bool,
}

pub async fn run(args: AnalyzeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::load_config(config_path)?;
    if let Some(company) = args.expected_company.clone() {
        config.verification.expected_company = Some(company);
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Analyzing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Reading document...");

    let data = fs::read(&args.input)?;
    let filename = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    pb.set_message("Extracting fields...");
    let analyzer = InvoiceAnalyzer::with_tesseract(config)?;
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&filename, data)).await??;

    pb.finish_and_clear();

    let output = render::render(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        for (name, m) in result.fields() {
            println!(
                "{} {:<16} {:>3}%  {:?} {}",
                style("ℹ").blue(),
                name,
                m.confidence,
                m.tier,
                m.pattern.as_deref().unwrap_or("")
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    if args.strict && !render::all_confirmed(&result) {
        anyhow::bail!("Verification failed for {}", args.input.display());
    }

    Ok(())
}
