//! HTTP handlers for video records and uploads.
//! Authentication and ownership are checked before the body is touched;
//! everything after that is delegated to `UploadPipeline`.

use crate::{
    errors::{AppError, PipelineError},
    models::video::{CreateVideoReq, VideoResponse},
    services::auth::bearer_token,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

/// `POST /api/videos`: create an empty record owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateVideoReq>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = authenticate(&state, &headers)?;
    if payload.title.trim().is_empty() {
        return Err(PipelineError::invalid("Title is required").into());
    }

    let video = state
        .videos
        .create(user_id, payload.title.trim(), payload.description.as_deref())
        .await
        .map_err(|e| PipelineError::database("Couldn't create video", e))?;

    let response = state.materializer.materialize(video).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/videos/{video_id}`: the caller's video with a freshly signed URL.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&state, &headers)?;
    let video = state.pipeline.authorize(video_id, user_id).await?;

    Ok(Json(state.materializer.materialize(video).await?))
}

/// `POST /api/videos/{video_id}/upload`: ingest the `video` form part.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&state, &headers)?;
    let video = state.pipeline.authorize(video_id, user_id).await?;

    tracing::info!(video_id = %video_id, user_id = %user_id, "Uploading video");

    let multipart =
        multipart.map_err(|e| PipelineError::invalid_with("Error parsing form data", e))?;
    let recorded = state.pipeline.ingest(&video, multipart).await?;

    Ok(Json(state.materializer.materialize(recorded).await?))
}

fn parse_video_id(raw: &str) -> Result<Uuid, PipelineError> {
    Uuid::parse_str(raw).map_err(|e| PipelineError::invalid_with("Invalid ID", e))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, PipelineError> {
    let token =
        bearer_token(headers).map_err(|e| PipelineError::unauthorized("Couldn't find JWT", e))?;
    state
        .tokens
        .verify(token)
        .map_err(|e| PipelineError::unauthorized("Couldn't validate JWT", e))
}
