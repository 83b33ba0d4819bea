//! Multipart intake: finds the video part, vets its declared type, and
//! streams it into a fresh [`UploadSession`].
//!
//! The overall body ceiling is enforced by the route's body limit layer, so
//! an oversized request surfaces here as a read error mid-stream.

use crate::{errors::PipelineError, services::staging::UploadSession};
use axum::extract::multipart::{Field, Multipart};
use mime::Mime;
use std::path::Path;
use tracing::debug;

/// Name of the multipart part carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// The only media type the fast-start pipeline accepts.
pub const ALLOWED_MEDIA_TYPE: &str = "video/mp4";

/// Parse a part's declared content type and require it to be `video/mp4`.
pub fn validate_media_type(declared: Option<&str>) -> Result<Mime, PipelineError> {
    let declared = declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .ok_or_else(|| PipelineError::invalid("Invalid Content-Type header"))?;
    let media_type: Mime = declared
        .parse()
        .map_err(|e| PipelineError::invalid_with("Invalid Content-Type header", e))?;

    if !media_type.essence_str().eq_ignore_ascii_case(ALLOWED_MEDIA_TYPE) {
        return Err(PipelineError::invalid(
            "Unsupported media type; only video/mp4 allowed",
        ));
    }
    Ok(media_type)
}

/// Read the form, staging the `video` part under `staging_root`.
///
/// The content type is checked from the part headers before anything is
/// written to disk. Other parts are drained chunk by chunk and dropped; the
/// route body limit bounds them.
pub async fn receive_upload(
    mut multipart: Multipart,
    staging_root: &Path,
    max_memory_bytes: usize,
) -> Result<UploadSession, PipelineError> {
    let mut session: Option<UploadSession> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::invalid_with("Error parsing form data", e))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            discard_field(field).await?;
            continue;
        }
        if session.is_some() {
            return Err(PipelineError::invalid("Multiple 'video' files provided"));
        }

        let media_type = validate_media_type(field.content_type())?;
        let mut staged = UploadSession::create(staging_root, media_type)
            .map_err(|e| PipelineError::staging("Failed to create temp file", e))?;
        staged.stage_stream(field, max_memory_bytes).await?;
        session = Some(staged);
    }

    session.ok_or_else(|| PipelineError::invalid("Missing or invalid 'video' file"))
}

async fn discard_field(mut field: Field<'_>) -> Result<(), PipelineError> {
    let name = field.name().unwrap_or_default().to_string();
    let mut seen = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| PipelineError::invalid_with("Error parsing form data", e))?
    {
        seen += chunk.len();
    }
    debug!(field = %name, bytes = seen, "Ignored form field");
    Ok(())
}
