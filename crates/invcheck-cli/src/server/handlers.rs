//! HTTP handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use invcheck_core::AnalysisResult;

use super::error::ApiError;
use super::AppState;
use crate::render;

/// Multipart field names accepted for the upload.
const FILE_FIELDS: &[&str] = &["file", "pdf_file"];

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Invoice check</title></head>
<body>
<h2>Upload an invoice</h2>
<form method="post" action="/analyze?format=html" enctype="multipart/form-data">
  <input type="file" name="file" accept=".pdf,image/*">
  <input type="submit" value="Analyze">
</form>
</body>
</html>
"#;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    format: Option<String>,
}

impl AnalyzeQuery {
    fn wants_html(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("html"))
    }
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

pub async fn index() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// Analyze an upload and respond with the result.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    info!("Analyzing upload {} ({} bytes)", filename, bytes.len());

    let analyzer = state.analyzer.clone();
    let log = state.low_confidence.clone();
    let result: AnalysisResult = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze(&filename, bytes)?;
        log.record_or_warn(&result);
        Ok::<_, ApiError>(result)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    if query.wants_html() {
        Ok(Html(render::to_html(&result)).into_response())
    } else {
        Ok(Json(result).into_response())
    }
}

/// Queue an upload for background analysis.
pub async fn analyze_async(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let job_id = state.jobs.submit(filename, bytes).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": job_id,
            "status": "queued",
        })),
    ))
}

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = state.jobs.status(id).await.ok_or(ApiError::JobNotFound(id))?;
    Ok(Json(record).into_response())
}

/// First non-empty file under one of [`FILE_FIELDS`].
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            debug!("Ignoring multipart field {}", name);
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|f| !f.is_empty());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;

        // Browsers send an empty part when no file was chosen
        if bytes.is_empty() && filename.is_none() {
            continue;
        }

        return Ok((filename.unwrap_or_else(|| "upload.pdf".to_string()), bytes.to_vec()));
    }

    Err(ApiError::NoFile)
}
