//! Video records and the shape returned to callers.

use crate::models::reference::{MalformedReference, StoredReference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video resource as persisted in the metadata store.
///
/// The record is created before any upload happens; the reference columns
/// stay empty until a pipeline run publishes an object for it.
#[derive(Clone, FromRow, Debug)]
pub struct Video {
    /// Opaque identifier used in request paths.
    pub id: Uuid,

    /// Owner; only this identity may upload to or read the record.
    pub user_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Bucket half of the stored reference.
    pub video_bucket: Option<String>,

    /// Key half of the stored reference.
    pub video_key: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn stored_reference(&self) -> Result<Option<StoredReference>, MalformedReference> {
        StoredReference::from_columns(self.video_bucket.as_deref(), self.video_key.as_deref())
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// A video as handed back over the API, with the stored reference swapped
/// for a freshly signed retrieval URL.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VideoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoResponse {
    pub fn new(video: Video, video_url: Option<String>) -> Self {
        Self {
            id: video.id,
            user_id: video.user_id,
            title: video.title,
            description: video.description,
            video_url,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

/// Body accepted by `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoReq {
    pub title: String,
    pub description: Option<String>,
}
