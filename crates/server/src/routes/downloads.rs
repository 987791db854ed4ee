// crates/server/src/routes/downloads.rs
//! Download job endpoints.
//!
//! - `POST   /api/download`             -- start a job
//! - `GET    /api/download/{id}/status` -- current record
//! - `GET    /api/download/{id}/file`   -- stream the finished file (once)
//! - `DELETE /api/download/{id}`        -- cancel an in-flight job
//! - `GET    /api/downloads`            -- all records

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tubefetch_core::{JobId, JobRecord, JobStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartDownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Deserialize))]
pub struct StartDownloadResponse {
    pub download_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Deserialize))]
pub struct CancelResponse {
    pub download_id: JobId,
    pub cancelled: bool,
}

/// POST /api/download
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartDownloadRequest>,
) -> ApiResult<Json<StartDownloadResponse>> {
    let url = body.url.as_deref().unwrap_or_default();
    let record = state.orchestrator.start_job(url, body.format.as_deref())?;
    Ok(Json(StartDownloadResponse {
        download_id: record.id,
        status: record.status,
    }))
}

/// GET /api/download/{id}/status
pub async fn download_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    state
        .orchestrator
        .get_job(&id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(id))
}

/// GET /api/download/{id}/file
///
/// The file and its record are removed shortly after the transfer ends.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let served = state.artifacts.serve(&id).await?;
    let disposition = content_disposition(&served.file_name);

    let mut response = Body::from_stream(served.stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(served.len));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| ApiError::Internal(format!("invalid content-disposition: {e}")))?,
    );
    Ok(response)
}

/// DELETE /api/download/{id}
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    if !state.orchestrator.cancel_job(&id) {
        return Err(ApiError::JobNotFound(id));
    }
    tracing::info!(job_id = %id, "download cancel requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            download_id: id,
            cancelled: true,
        }),
    ))
}

/// GET /api/downloads
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<Vec<JobRecord>> {
    Json(state.orchestrator.list_jobs())
}

/// `attachment` header with an ASCII fallback name plus the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/download", post(start_download))
        .route("/download/{id}/status", get(download_status))
        .route("/download/{id}/file", get(download_file))
        .route("/download/{id}", delete(cancel_download))
        .route("/downloads", get(list_downloads))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("abc_My Video.mp4"),
            "attachment; filename=\"abc_My Video.mp4\"; filename*=UTF-8''abc_My%20Video.mp4"
        );
    }

    #[test]
    fn test_content_disposition_unicode_and_quotes() {
        let header = content_disposition("abc_\"Ünïcode\".webm");
        assert!(header.starts_with("attachment; filename=\"abc___n_code_.webm\""));
        assert!(header.contains("filename*=UTF-8''abc_%22%C3%9Cn%C3%AFcode%22.webm"));
        assert!(HeaderValue::from_str(&header).is_ok());
    }
}
