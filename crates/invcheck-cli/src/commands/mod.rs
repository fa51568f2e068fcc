//! Subcommand implementations.

pub mod analyze;
pub mod batch;
pub mod config;
pub mod serve;

use std::path::{Path, PathBuf};

use tracing::debug;

use invcheck_core::InvcheckConfig;

/// `<config dir>/invcheck/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invcheck")
        .join("config.json")
}

/// Load the configuration named by `-c`, else the default file if one
/// exists, else built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvcheckConfig> {
    if let Some(path) = config_path {
        let config = InvcheckConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e))?;
        return Ok(config);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return Ok(InvcheckConfig::from_file(&default_path)?);
    }

    Ok(InvcheckConfig::default())
}
