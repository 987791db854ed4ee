// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tubefetch_core::MetadataError;

use crate::artifacts::ArtifactError;
use crate::jobs::{StartError, StoreError, ValidationError};

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Download not found: {0}")]
    JobNotFound(String),

    #[error("File not found: {0}")]
    ArtifactNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Metadata lookup failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::Invalid(e) => e.into(),
            StartError::Store(StoreError::AlreadyExists(id)) => {
                ApiError::Internal(format!("job id collision: {id}"))
            }
        }
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(id) => ApiError::ArtifactNotFound(id),
            ArtifactError::Io { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Download not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Download not found", format!("Download ID: {}", id)),
                )
            }
            ApiError::ArtifactNotFound(id) => {
                tracing::warn!(job_id = %id, "File not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("File not found", format!("Download ID: {}", id)),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Metadata(meta_err) => {
                let error_msg = match meta_err {
                    MetadataError::SpawnFailed(_) => "Download worker not available",
                    MetadataError::Timeout(_) => "Metadata lookup timed out",
                    MetadataError::LookupFailed(_) | MetadataError::InvalidJson(_) => {
                        "Failed to get video info"
                    }
                };
                tracing::error!(error = %meta_err, "Metadata lookup failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::with_details(error_msg, meta_err.to_string()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
