//! Defines routes for the video API.
//!
//! ## Structure
//! - **Health endpoints**
//!   - `GET  /healthz` — liveness
//!   - `GET  /readyz`  — readiness (SQLite + staging directory)
//!
//! - **Video endpoints**
//!   - `POST /api/videos`                    — create a video record
//!   - `GET  /api/videos/{video_id}`         — fetch a video with a signed URL
//!   - `POST /api/videos/{video_id}/upload`  — upload the MP4 for a video
//!
//! Every `/api` response carries `Cache-Control: no-store`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        video_handlers::{create_video, get_video, upload_video},
    },
    services::pipeline::PipelineConfig,
    state::AppState,
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};

/// Build and return the router for the service.
///
/// The pipeline's `max_upload_bytes` caps the whole upload request body;
/// other routes keep axum's default limit.
pub fn routes(config: &PipelineConfig) -> Router<AppState> {
    let api = Router::new()
        .route("/api/videos", post(create_video))
        .route("/api/videos/{video_id}", get(get_video))
        .route(
            "/api/videos/{video_id}/upload",
            post(upload_video).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .layer(middleware::from_fn(no_store));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(api)
}

/// Signed URLs are short-lived, so nothing under `/api` may be cached.
async fn no_store(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
