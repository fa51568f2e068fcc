//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use invcheck_core::InvcheckError;

use super::jobs::SubmitError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Queue(#[from] SubmitError),

    #[error(transparent)]
    Analysis(#[from] InvcheckError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NoFile => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::InvalidUpload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::JobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Queue(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            // Unreadable documents are the caller's problem; say why
            ApiError::Analysis(e @ InvcheckError::Pdf(_)) => {
                tracing::warn!("Rejected document: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Analysis(e) => {
                tracing::error!("Analysis failed: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error while analyzing the document".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
