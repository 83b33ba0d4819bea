//! Shared state handed to every handler.

use crate::services::{
    auth::TokenVerifier, materializer::ReferenceMaterializer, pipeline::UploadPipeline,
    video_repository::VideoRepository,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub videos: VideoRepository,
    pub pipeline: Arc<UploadPipeline>,
    pub materializer: ReferenceMaterializer,
    pub tokens: TokenVerifier,
}
