//! HTTP front end.
//!
//! Routes:
//! - `GET /` upload form
//! - `GET /health`
//! - `POST /` and `POST /analyze` analyze an upload and return the result
//!   (`?format=html` for an HTML table)
//! - `POST /analyze/async` queue an upload, returns a job id
//! - `GET /jobs/:id` job status and, once done, its result

mod confidence_log;
mod error;
mod handlers;
mod jobs;

use confidence_log::LowConfidenceLog;
use jobs::JobQueue;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use invcheck_core::{InvcheckConfig, InvoiceAnalyzer};

/// Shared application state.
pub struct AppState {
    pub analyzer: Arc<InvoiceAnalyzer>,
    pub jobs: JobQueue,
    pub low_confidence: Arc<LowConfidenceLog>,
}

impl AppState {
    /// Wrap `analyzer` and start the job queue workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(analyzer: InvoiceAnalyzer) -> Self {
        let server = analyzer.config().server.clone();
        let analyzer = Arc::new(analyzer);
        let low_confidence = Arc::new(LowConfidenceLog::new(
            server.low_confidence_log,
            server.low_confidence_threshold,
        ));
        let jobs = JobQueue::start(
            analyzer.clone(),
            low_confidence.clone(),
            server.results_dir,
            server.workers,
            server.queue_capacity,
            server.max_job_records,
        );

        Self {
            analyzer,
            jobs,
            low_confidence,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.analyzer.config().server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index).post(handlers::analyze))
        .route("/health", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/async", post(handlers::analyze_async))
        .route("/jobs/:id", get(handlers::job_status))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn serve(config: InvcheckConfig, port: u16) -> anyhow::Result<()> {
    let host = config.server.host.clone();
    let analyzer = InvoiceAnalyzer::with_tesseract(config)?;
    let state = Arc::new(AppState::new(analyzer));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting invcheck on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use image::DynamicImage;
    use invcheck_core::error::OcrError;
    use invcheck_core::OcrBackend;
    use lopdf::{dictionary, Object, Stream};
    use pretty_assertions::assert_eq;
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "invcheck-test-boundary";

    /// OCR stand-in that returns fixed page texts.
    struct StubOcr(Vec<String>);

    impl OcrBackend for StubOcr {
        fn name(&self) -> &str {
            "stub"
        }

        fn recognize_pdf(&self, _pdf: &[u8], _max_pages: usize) -> Result<Vec<String>, OcrError> {
            Ok(self.0.clone())
        }

        fn recognize_image(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok(self.0.join("\n"))
        }
    }

    /// OCR stand-in that blocks every call until the gate opens.
    #[derive(Clone, Default)]
    struct Gate(Arc<(Mutex<bool>, Condvar)>);

    impl Gate {
        fn open(&self) {
            let (open, cvar) = &*self.0;
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }

        fn wait(&self) {
            let (open, cvar) = &*self.0;
            let mut guard = open.lock().unwrap();
            while !*guard {
                guard = cvar.wait(guard).unwrap();
            }
        }
    }

    /// Opens the gate when dropped so blocked workers never outlive a
    /// failing test.
    struct OpenOnDrop(Gate);

    impl Drop for OpenOnDrop {
        fn drop(&mut self) {
            self.0.open();
        }
    }

    struct GatedOcr(Gate);

    impl OcrBackend for GatedOcr {
        fn name(&self) -> &str {
            "gated"
        }

        fn recognize_pdf(&self, _pdf: &[u8], _max_pages: usize) -> Result<Vec<String>, OcrError> {
            self.0.wait();
            Ok(Vec::new())
        }

        fn recognize_image(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            self.0.wait();
            Ok(String::new())
        }
    }

    fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut content = String::new();
        for (i, line) in lines.iter().enumerate() {
            content.push_str(&format!(
                "BT /F1 11 Tf 50 {} Td ({}) Tj ET\n",
                760 - i * 16,
                line
            ));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let kids: Vec<Object> = vec![page_id.into()];
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn invoice_pdf() -> Vec<u8> {
        pdf_with_lines(&[
            "COMMERCIAL INVOICE",
            "Seller: Shenzhen Bright Trading Co., Ltd",
            "Total Amount: USD 12,345.67",
            "Beneficiary's Bank: Bank of China, Shenzhen Branch",
            "SWIFT Code: BKCHCNBJ45A",
            "Account No.: 7414 5678 9012",
        ])
    }

    fn multipart(field: &str, filename: &str, data: &[u8]) -> Body {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn upload(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    fn test_app(dir: &std::path::Path, ocr_pages: &[&str]) -> Router {
        let ocr = StubOcr(ocr_pages.iter().map(|p| p.to_string()).collect());
        test_app_with(dir, Arc::new(ocr), |_| {})
    }

    fn test_app_with(
        dir: &std::path::Path,
        ocr: Arc<dyn OcrBackend>,
        configure: impl FnOnce(&mut InvcheckConfig),
    ) -> Router {
        let mut config = InvcheckConfig::default();
        config.server.results_dir = dir.join("results");
        config.server.low_confidence_log = dir.join("low_confidence.log");
        config.server.workers = 1;
        configure(&mut config);

        let analyzer = InvoiceAnalyzer::new(config, ocr).unwrap();
        router(Arc::new(AppState::new(analyzer)))
    }

    /// Poll `/jobs/:id` until the job finishes or the attempts run out.
    async fn wait_for_job(app: &Router, job_id: &str) -> serde_json::Value {
        let mut record = serde_json::Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/jobs/{}", job_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            record = body_json(response).await;
            if record["status"] == "completed" || record["status"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        record
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_index_serves_upload_form() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_analyze_returns_flat_json() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(upload("/analyze", multipart("file", "invoice.pdf", &invoice_pdf())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["total_amount"], "12345.67");
        assert_eq!(json["swift_code"], "BKCHCNBJ45A");
        assert_eq!(json["verification_bank"], "confirmed");
    }

    #[tokio::test]
    async fn test_root_post_accepts_legacy_field_name() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(upload("/", multipart("pdf_file", "invoice.pdf", &invoice_pdf())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["currency"], "USD");
    }

    #[tokio::test]
    async fn test_analyze_html_format() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(upload(
                "/analyze?format=html",
                multipart("file", "invoice.pdf", &invoice_pdf()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<td>swift_code</td><td>BKCHCNBJ45A</td>"));
    }

    #[tokio::test]
    async fn test_scanned_upload_writes_low_confidence_log() {
        let dir = tempfile::tempdir().unwrap();
        let blank = pdf_with_lines(&[]);
        let response = test_app(dir.path(), &["----"])
            .oneshot(upload("/analyze", multipart("file", "scan.pdf", &blank)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["beneficiary"], "not found");

        let log = std::fs::read_to_string(dir.path().join("low_confidence.log")).unwrap();
        assert!(log.contains("\tscan.pdf\t"));
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(upload("/analyze", multipart("other", "x.pdf", b"data")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No file uploaded");
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn test_unreadable_upload_reports_reason() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(upload("/analyze", multipart("file", "junk.bin", b"not a document")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("junk.bin"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), &[])
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_async_job_completes() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), &[]);

        let response = app
            .clone()
            .oneshot(upload(
                "/analyze/async",
                multipart("file", "invoice.pdf", &invoice_pdf()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let accepted = body_json(response).await;
        assert_eq!(accepted["status"], "queued");
        let job_id = accepted["job_id"].as_str().unwrap().to_string();

        let record = wait_for_job(&app, &job_id).await;
        assert_eq!(record["status"], "completed");
        assert_eq!(record["filename"], "invoice.pdf");
        assert_eq!(record["result"]["currency"], "USD");

        let result_file = record["result_file"].as_str().unwrap();
        assert!(std::path::Path::new(result_file).exists());
    }

    #[tokio::test]
    async fn test_async_job_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), &[]);

        let response = app
            .clone()
            .oneshot(upload(
                "/analyze/async",
                multipart("file", "junk.bin", b"not a document"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

        let record = wait_for_job(&app, &job_id).await;
        assert_eq!(record["status"], "failed");
        assert_eq!(record["filename"], "junk.bin");
        let error = record["error"].as_str().unwrap();
        assert!(error.contains("junk.bin"), "unexpected error: {error}");
        assert!(record.get("result").is_none());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_upload() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Gate::default();
        let _release = OpenOnDrop(gate.clone());
        let app = test_app_with(dir.path(), Arc::new(GatedOcr(gate)), |config| {
            config.server.queue_capacity = 1;
        });

        // A blank page forces OCR, which holds the only worker at the gate
        let blank = pdf_with_lines(&[]);
        let mut statuses = Vec::new();
        let mut rejected = None;
        for i in 0..3 {
            let response = app
                .clone()
                .oneshot(upload(
                    "/analyze/async",
                    multipart("file", &format!("scan-{i}.pdf"), &blank),
                ))
                .await
                .unwrap();
            statuses.push(response.status());
            if response.status() == StatusCode::SERVICE_UNAVAILABLE && rejected.is_none() {
                rejected = Some(body_json(response).await);
            }
        }

        assert_eq!(statuses[0], StatusCode::ACCEPTED);
        assert!(
            statuses[1..].contains(&StatusCode::SERVICE_UNAVAILABLE),
            "statuses: {statuses:?}"
        );
        let rejected = rejected.unwrap();
        assert_eq!(rejected["error"], "Job queue is full");
        assert_eq!(rejected["status"], 503);
    }
}
