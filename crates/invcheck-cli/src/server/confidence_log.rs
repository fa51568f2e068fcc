//! Append-only log of fields extracted with low confidence.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;

use invcheck_core::AnalysisResult;

/// One line per analysis with at least one weak field:
/// `<rfc3339>\t<filename>\t<field>=<confidence>,...`
pub struct LowConfidenceLog {
    path: PathBuf,
    threshold: u8,
    lock: Mutex<()>,
}

impl LowConfidenceLog {
    pub fn new(path: impl Into<PathBuf>, threshold: u8) -> Self {
        Self {
            path: path.into(),
            threshold,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the weak fields of `result`, if any. Returns whether a line
    /// was written.
    pub fn record(&self, result: &AnalysisResult) -> std::io::Result<bool> {
        let weak = result.weak_fields(self.threshold);
        if weak.is_empty() {
            return Ok(false);
        }

        let fields = weak
            .iter()
            .map(|(name, confidence)| format!("{}={}", name, confidence))
            .collect::<Vec<_>>()
            .join(",");
        let line = format!(
            "{}\t{}\t{}\n",
            Utc::now().to_rfc3339(),
            result.filename().replace(['\t', '\n'], " "),
            fields
        );

        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(true)
    }

    /// Like [`record`](Self::record), but only logs I/O failures.
    pub fn record_or_warn(&self, result: &AnalysisResult) {
        if let Err(e) = self.record(result) {
            warn!(
                "Could not append to low-confidence log {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
