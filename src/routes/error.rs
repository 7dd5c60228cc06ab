use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::job_store::JobError;

/// Error type for HTTP handlers, rendered as `{ "error", "code" }` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Uploaded file is not a supported image")]
    UnsupportedMediaType,

    #[error("Image not found")]
    ImageNotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Job(JobError::CapacityExceeded { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CAPACITY_EXCEEDED")
            }
            ApiError::Job(JobError::NotFound(_)) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::UnsupportedMediaType => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            ApiError::ImageNotFound => (StatusCode::NOT_FOUND, "IMAGE_NOT_FOUND"),
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
