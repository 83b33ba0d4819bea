//! Turns stored references into short-lived retrieval URLs on read.

use crate::{
    errors::PipelineError,
    models::{
        reference::StoredReference,
        video::{Video, VideoResponse},
    },
    services::object_store::ObjectStore,
};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct ReferenceMaterializer {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl ReferenceMaterializer {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Build the caller-facing view of `video`, signing its reference.
    ///
    /// A video that has never been uploaded gets `video_url: None`. The
    /// record itself is left alone; every call signs afresh.
    pub async fn materialize(&self, video: Video) -> Result<VideoResponse, PipelineError> {
        let reference = video
            .stored_reference()
            .map_err(|e| PipelineError::signing("Failed to generate presigned URL", e))?;

        let video_url = match reference {
            Some(reference) => Some(self.sign(&reference).await?),
            None => None,
        };
        Ok(VideoResponse::new(video, video_url))
    }

    pub async fn sign(&self, reference: &StoredReference) -> Result<String, PipelineError> {
        self.store
            .presign_get(reference.bucket(), reference.key(), self.ttl)
            .await
            .map_err(|e| PipelineError::signing("Failed to generate presigned URL", e))
    }
}
