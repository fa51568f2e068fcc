//! Serve command - run the HTTP analysis service.

use clap::Args;
use tracing::{info, warn};

use invcheck_core::TesseractBackend;

use crate::server;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (default: $PORT, then the configured port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Number of background job workers
    #[arg(short = 'j', long)]
    workers: Option<usize>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(workers) = args.workers {
        config.server.workers = workers;
    }

    let port = args
        .port
        .unwrap_or_else(|| config.resolve_port(std::env::var("PORT").ok().as_deref()));

    let ocr = TesseractBackend::new(&config.ocr, config.pdf.render_dpi);
    if ocr.is_available() {
        info!("OCR fallback: {}", config.ocr.tesseract_cmd);
    } else {
        warn!(
            "{} or {} not found; scanned documents will fail to analyze",
            config.ocr.tesseract_cmd, config.ocr.pdftoppm_cmd
        );
    }

    server::serve(config, port).await
}
