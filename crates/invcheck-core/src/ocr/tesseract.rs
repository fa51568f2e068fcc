//! OCR through the poppler and tesseract command-line tools.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::{debug, info, trace, warn};
use wait_timeout::ChildExt;

use super::{ImagePreprocessor, OcrBackend, Result};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Renders PDF pages with `pdftoppm` and recognizes them with `tesseract`.
pub struct TesseractBackend {
    tesseract_cmd: String,
    pdftoppm_cmd: String,
    languages: String,
    page_seg_mode: u8,
    dpi: u32,
    timeout: Duration,
    preprocessor: ImagePreprocessor,
}

impl TesseractBackend {
    pub fn new(config: &OcrConfig, dpi: u32) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            pdftoppm_cmd: config.pdftoppm_cmd.clone(),
            languages: config.language_arg(),
            page_seg_mode: config.page_seg_mode,
            dpi: dpi.max(72),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            preprocessor: ImagePreprocessor::from_config(config),
        }
    }

    /// Whether the tesseract executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.tesseract_cmd)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Render pages to `dir/page-N.png`, returned in page order.
    fn render_pages(&self, pdf: &Path, dir: &Path, max_pages: usize) -> Result<Vec<PathBuf>> {
        let prefix = dir.join("page");
        let mut cmd = Command::new(&self.pdftoppm_cmd);
        cmd.arg("-r").arg(self.dpi.to_string()).arg("-png");
        if max_pages > 0 {
            cmd.arg("-l").arg(max_pages.to_string());
        }
        cmd.arg(pdf).arg(&prefix);

        run(&mut cmd, &self.pdftoppm_cmd, self.timeout)?;

        let entries = std::fs::read_dir(dir).map_err(|e| OcrError::Render(e.to_string()))?;
        let mut pages: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            return Err(OcrError::Render(
                "pdftoppm produced no page images".to_string(),
            ));
        }

        debug!("Rendered {} pages at {} DPI", pages.len(), self.dpi);
        Ok(pages.into_iter().map(|(_, p)| p).collect())
    }

    /// Run tesseract on an image file and return its stdout.
    fn recognize_file(&self, image: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.tesseract_cmd);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string());

        let output = run(&mut cmd, &self.tesseract_cmd, self.timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Preprocess a rendered page in place, unless there is nothing to do.
    fn prepare_page(&self, path: &Path) -> Result<()> {
        let image = image::open(path).map_err(|e| OcrError::Preprocessing(e.to_string()))?;
        if self.preprocessor.is_noop(&image) {
            return Ok(());
        }
        self.preprocessor
            .prepare(&image)
            .save(path)
            .map_err(|e| OcrError::Preprocessing(e.to_string()))
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_pdf(&self, pdf: &[u8], max_pages: usize) -> Result<Vec<String>> {
        let start = Instant::now();
        let dir = tempfile::tempdir().map_err(|e| OcrError::Render(e.to_string()))?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, pdf).map_err(|e| OcrError::Render(e.to_string()))?;

        let pages = self.render_pages(&input, dir.path(), max_pages)?;

        let mut texts = Vec::with_capacity(pages.len());
        let mut last_error = None;
        for (i, page) in pages.iter().enumerate() {
            match self.prepare_page(page).and_then(|_| self.recognize_file(page)) {
                Ok(text) => {
                    trace!("OCR page {}: {} chars", i + 1, text.len());
                    texts.push(text);
                }
                Err(e) => {
                    warn!("OCR failed on page {}: {}", i + 1, e);
                    texts.push(String::new());
                    last_error = Some(e);
                }
            }
        }

        // A page that fails is skipped; only a total failure is an error
        if let Some(e) = last_error.filter(|_| texts.iter().all(|t| t.is_empty())) {
            return Err(e);
        }

        info!(
            "OCR finished: {} pages in {}ms",
            texts.len(),
            start.elapsed().as_millis()
        );
        Ok(texts)
    }

    fn recognize_image(&self, image: &DynamicImage) -> Result<String> {
        let dir = tempfile::tempdir().map_err(|e| OcrError::Preprocessing(e.to_string()))?;
        let path = dir.path().join("upload.png");

        self.preprocessor
            .prepare(image)
            .save(&path)
            .map_err(|e| OcrError::Preprocessing(e.to_string()))?;

        self.recognize_file(&path)
    }
}

/// `page-7.png` / `page-007.png` -> 7
fn page_number(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}

/// Run a command to completion, killing it once `timeout` has elapsed.
fn run(cmd: &mut Command, tool: &str, timeout: Duration) -> Result<Output> {
    trace!("Running {:?}", cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OcrError::Spawn {
            tool: tool.to_string(),
            reason: e.to_string(),
        })?;

    // Drain pipes on threads so a chatty child cannot block on a full pipe
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(OcrError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        Err(e) => {
            return Err(OcrError::Spawn {
                tool: tool.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let output = Output {
        status,
        stdout: stdout.and_then(|h| h.join().ok()).unwrap_or_default(),
        stderr: stderr.and_then(|h| h.join().ok()).unwrap_or_default(),
    };

    if !output.status.success() {
        return Err(OcrError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn backend(tesseract: &str, pdftoppm: &str) -> TesseractBackend {
        let config = OcrConfig {
            tesseract_cmd: tesseract.to_string(),
            pdftoppm_cmd: pdftoppm.to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        TesseractBackend::new(&config, 200)
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number(Path::new("/tmp/x/input.pdf")), None);
        assert_eq!(page_number(Path::new("/tmp/x/page-a.png")), None);
    }

    #[test]
    fn test_missing_tesseract_is_spawn_error() {
        let backend = backend("/nonexistent/tesseract", "/nonexistent/pdftoppm");
        assert!(!backend.is_available());

        let image = DynamicImage::new_luma8(8, 8);
        let err = backend.recognize_image(&image).unwrap_err();
        assert!(matches!(err, OcrError::Spawn { ref tool, .. } if tool == "/nonexistent/tesseract"));
    }

    #[test]
    fn test_missing_pdftoppm_is_spawn_error() {
        let backend = backend("/nonexistent/tesseract", "/nonexistent/pdftoppm");
        let err = backend.recognize_pdf(b"%PDF-1.4", 0).unwrap_err();
        assert!(matches!(err, OcrError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_failure_and_timeout() {
        let err = run(
            Command::new("sh").args(["-c", "echo broken >&2; exit 3"]),
            "sh",
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            OcrError::Failed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }

        let err = run(
            Command::new("sh").args(["-c", "sleep 5"]),
            "sh",
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, OcrError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_returns_as_soon_as_timeout_expires() {
        let start = Instant::now();
        let err = run(
            Command::new("sh").args(["-c", "exec sleep 30"]),
            "sh",
            Duration::from_millis(200),
        )
        .unwrap_err();

        assert!(matches!(err, OcrError::Timeout { ref tool, .. } if tool == "sh"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout() {
        let output = run(
            Command::new("sh").args(["-c", "echo 'SWIFT: BKCHCNBJ'"]),
            "sh",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "SWIFT: BKCHCNBJ\n");
    }
}
