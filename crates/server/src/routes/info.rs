// crates/server/src/routes/info.rs
//! Video metadata lookup.
//!
//! - `POST /api/info` `{url}` -- title, thumbnail, duration and format menu

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tubefetch_core::VideoInfo;

use crate::error::ApiResult;
use crate::jobs::validate_url;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: Option<String>,
}

pub async fn video_info(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InfoRequest>,
) -> ApiResult<Json<VideoInfo>> {
    let url = validate_url(body.url.as_deref().unwrap_or_default())?;

    tracing::info!(url, "fetching video info");
    let info = state.config.worker.fetch_video_info(url).await?;
    Ok(Json(info))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/info", post(video_info))
}
