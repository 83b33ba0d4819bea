//! The ingestion pipeline.
//!
//! Each stage is a type that owns whatever the next stage needs:
//!
//! `Staged → Prepared → Published → (recorded Video)`
//!
//! `Staged` and `Prepared` own the [`UploadSession`], so returning early
//! from any of them drops the session and removes both artifacts.
//! `Published` no longer holds local files; it only carries the reference
//! that still has to be written back.

use crate::{
    errors::PipelineError,
    models::{reference::StoredReference, video::Video},
    services::{
        classify::Orientation,
        intake,
        media::MediaToolkit,
        object_key::ObjectKey,
        object_store::ObjectStore,
        staging::UploadSession,
        video_repository::VideoRepository,
    },
};
use axum::extract::Multipart;
use std::{path::PathBuf, sync::Arc, time::Duration, time::Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Process-wide settings handed to the pipeline at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which each request gets its own session directory.
    pub staging_dir: PathBuf,
    /// Bucket every object is published to.
    pub bucket: String,
    /// Ceiling on the whole request body.
    pub max_upload_bytes: usize,
    /// In-memory buffer bound while streaming the form to disk.
    pub max_memory_bytes: usize,
    /// Validity of presigned retrieval URLs.
    pub presign_ttl: Duration,
}

#[derive(Clone)]
pub struct UploadPipeline {
    config: PipelineConfig,
    toolkit: Arc<dyn MediaToolkit>,
    store: Arc<dyn ObjectStore>,
    videos: VideoRepository,
}

impl UploadPipeline {
    pub fn new(
        config: PipelineConfig,
        toolkit: Arc<dyn MediaToolkit>,
        store: Arc<dyn ObjectStore>,
        videos: VideoRepository,
    ) -> Self {
        Self {
            config,
            toolkit,
            store,
            videos,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load `video_id` and require `user_id` to own it.
    pub async fn authorize(&self, video_id: Uuid, user_id: Uuid) -> Result<Video, PipelineError> {
        let video = self
            .videos
            .get(video_id)
            .await
            .map_err(|e| PipelineError::database("Error retrieving video", e))?
            .ok_or(PipelineError::NotFound("Video not found"))?;

        if !video.is_owned_by(user_id) {
            return Err(PipelineError::Forbidden("You do not own this video"));
        }
        Ok(video)
    }

    /// Run every stage for an already authorized `video`.
    pub async fn ingest(
        &self,
        video: &Video,
        multipart: Multipart,
    ) -> Result<Video, PipelineError> {
        let started = Instant::now();
        let session = intake::receive_upload(
            multipart,
            &self.config.staging_dir,
            self.config.max_memory_bytes,
        )
        .await?;
        info!(
            video_id = %video.id,
            user_id = %video.user_id,
            bytes = session.staged_bytes(),
            "Upload staged"
        );

        let recorded = Staged::new(session)
            .prepare(self.toolkit.as_ref())
            .await?
            .publish(self.store.as_ref(), &self.config.bucket)
            .await?
            .record(&self.videos, self.store.as_ref(), video.id)
            .await?;

        info!(
            video_id = %video.id,
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload pipeline finished"
        );
        Ok(recorded)
    }
}

/// The original artifact is on disk and nothing else has happened.
pub struct Staged {
    session: UploadSession,
}

impl Staged {
    pub fn new(session: UploadSession) -> Self {
        Self { session }
    }

    /// Remux and classify the original. The two read the same file and
    /// share nothing else, so they run side by side.
    ///
    /// A remux failure aborts; an inspection failure only downgrades the
    /// orientation to `Other`.
    pub async fn prepare(self, toolkit: &dyn MediaToolkit) -> Result<Prepared, PipelineError> {
        let original = self.session.original_path();
        let processed = self.session.processed_path();

        let (remuxed, inspected) = tokio::join!(
            toolkit.remux_fast_start(original, processed),
            toolkit.inspect(original),
        );

        remuxed
            .map_err(|e| PipelineError::processing("Failed to process video for fast start", e))?;

        let orientation = match inspected {
            Ok(geometry) => Orientation::from(geometry),
            Err(err) => {
                warn!(error = %err, "Could not read video geometry; classifying as other");
                Orientation::Other
            }
        };

        Ok(Prepared {
            session: self.session,
            orientation,
        })
    }
}

/// The fast-start artifact exists and the orientation is known.
pub struct Prepared {
    session: UploadSession,
    orientation: Orientation,
}

impl Prepared {
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Upload the processed artifact under a fresh key. The session is
    /// released once the upload call returns, whatever its outcome.
    pub async fn publish(
        self,
        store: &dyn ObjectStore,
        bucket: &str,
    ) -> Result<Published, PipelineError> {
        let key = ObjectKey::generate(self.orientation)
            .map_err(|e| PipelineError::storage("Failed to generate random filename", e))?;
        let content_type = self.session.media_type().essence_str().to_string();

        store
            .put_file(bucket, key.as_str(), self.session.processed_path(), &content_type)
            .await
            .map_err(|e| PipelineError::storage("Failed to upload video", e))?;
        info!(bucket = %bucket, key = %key, orientation = %self.orientation, "Video published");

        drop(self.session);
        let reference = StoredReference::new(bucket, key.into_string())
            .map_err(|e| PipelineError::storage("Failed to upload video", e))?;
        Ok(Published { reference })
    }
}

/// The object is in the store; the record does not point at it yet.
pub struct Published {
    reference: StoredReference,
}

impl Published {
    pub fn reference(&self) -> &StoredReference {
        &self.reference
    }

    /// Persist the reference on `video_id`. If that fails, the freshly
    /// uploaded object is deleted again so it is not left unreferenced.
    pub async fn record(
        self,
        videos: &VideoRepository,
        store: &dyn ObjectStore,
        video_id: Uuid,
    ) -> Result<Video, PipelineError> {
        let failure = match videos.set_reference(video_id, &self.reference).await {
            Ok(Some(video)) => return Ok(video),
            Ok(None) => PipelineError::storage(
                "Failed to update video URL",
                "video disappeared before the reference was written",
            ),
            Err(err) => PipelineError::storage("Failed to update video URL", err),
        };

        match store
            .delete(self.reference.bucket(), self.reference.key())
            .await
        {
            Ok(()) => warn!(
                key = %self.reference.key(),
                "Removed published object after failing to record it"
            ),
            Err(err) => error!(
                error = %err,
                key = %self.reference.key(),
                "Published object is orphaned; compensating delete failed"
            ),
        }
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        media::Geometry,
        testing::{FakeToolkit, MemoryObjectStore},
        video_repository::memory_repository,
    };
    use bytes::Bytes;
    use futures::stream;
    use std::io;

    async fn staged_session(root: &std::path::Path, body: &'static [u8]) -> UploadSession {
        let mut session = UploadSession::create(root, "video/mp4".parse().unwrap()).unwrap();
        session
            .stage_stream(
                stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(body))]),
                1024,
            )
            .await
            .unwrap();
        session
    }

    fn dir_is_empty(root: &std::path::Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn prepare_remuxes_and_classifies() {
        let root = tempfile::tempdir().unwrap();
        let session = staged_session(root.path(), b"moov-at-end").await;

        let prepared = Staged::new(session)
            .prepare(&FakeToolkit::with_geometry(1080, 1920))
            .await
            .unwrap();

        assert_eq!(prepared.orientation(), Orientation::Tall);
        let processed = tokio::fs::read(prepared.session.processed_path()).await.unwrap();
        assert!(processed.starts_with(FakeToolkit::REMUX_MARKER));
    }

    #[tokio::test]
    async fn inspection_failure_falls_back_to_other() {
        let root = tempfile::tempdir().unwrap();
        let session = staged_session(root.path(), b"data").await;
        let toolkit = FakeToolkit {
            geometry: None,
            fail_remux: false,
        };

        let prepared = Staged::new(session).prepare(&toolkit).await.unwrap();
        assert_eq!(prepared.orientation(), Orientation::Other);
    }

    #[tokio::test]
    async fn remux_failure_aborts_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let session = staged_session(root.path(), b"data").await;
        let toolkit = FakeToolkit {
            geometry: Geometry::new(1920, 1080),
            fail_remux: true,
        };

        let err = Staged::new(session).prepare(&toolkit).await.err().unwrap();
        assert!(matches!(err, PipelineError::Processing { .. }));
        assert!(dir_is_empty(root.path()));
    }

    #[tokio::test]
    async fn publish_uploads_the_processed_artifact() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default();
        let session = staged_session(root.path(), b"original").await;

        let published = Staged::new(session)
            .prepare(&FakeToolkit::with_geometry(1920, 1080))
            .await
            .unwrap()
            .publish(&store, "media")
            .await
            .unwrap();

        let reference = published.reference();
        assert_eq!(reference.bucket(), "media");
        assert!(reference.key().starts_with("wide/"));

        let objects = store.objects();
        assert_eq!(objects.len(), 1);
        let object = &objects[&("media".to_string(), reference.key().to_string())];
        assert_eq!(object.body, b"faststart:original");
        assert_eq!(object.content_type, "video/mp4");
        assert!(dir_is_empty(root.path()));
    }

    #[tokio::test]
    async fn failed_upload_reports_storage_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default();
        store.fail_put();
        let session = staged_session(root.path(), b"original").await;

        let err = Staged::new(session)
            .prepare(&FakeToolkit::with_geometry(1920, 1080))
            .await
            .unwrap()
            .publish(&store, "media")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, PipelineError::Storage { .. }));
        assert!(store.objects().is_empty());
        assert!(dir_is_empty(root.path()));
    }

    #[tokio::test]
    async fn record_failure_removes_the_published_object() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default();
        let videos = memory_repository().await;
        let session = staged_session(root.path(), b"original").await;

        let published = Staged::new(session)
            .prepare(&FakeToolkit::with_geometry(1920, 1080))
            .await
            .unwrap()
            .publish(&store, "media")
            .await
            .unwrap();
        assert_eq!(store.objects().len(), 1);

        let err = published
            .record(&videos, &store, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Storage { .. }));
        assert!(store.objects().is_empty());
    }

    #[tokio::test]
    async fn failed_compensating_delete_still_reports_storage() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default();
        store.fail_delete();
        let videos = memory_repository().await;
        let session = staged_session(root.path(), b"original").await;

        let published = Staged::new(session)
            .prepare(&FakeToolkit::with_geometry(1920, 1080))
            .await
            .unwrap()
            .publish(&store, "media")
            .await
            .unwrap();
        let key = published.reference().key().to_string();

        let err = published
            .record(&videos, &store, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Storage { .. }));
        assert!(store.objects().contains_key(&("media".to_string(), key)));
    }

    #[tokio::test]
    async fn authorize_checks_existence_then_ownership() {
        let videos = memory_repository().await;
        let owner = Uuid::new_v4();
        let video = videos.create(owner, "Boots", None).await.unwrap();
        let pipeline = UploadPipeline::new(
            PipelineConfig {
                staging_dir: std::env::temp_dir(),
                bucket: "media".into(),
                max_upload_bytes: 1 << 20,
                max_memory_bytes: 1 << 10,
                presign_ttl: Duration::from_secs(900),
            },
            Arc::new(FakeToolkit::with_geometry(1920, 1080)),
            Arc::new(MemoryObjectStore::default()),
            videos,
        );

        assert!(pipeline.authorize(video.id, owner).await.is_ok());
        assert!(matches!(
            pipeline.authorize(video.id, Uuid::new_v4()).await,
            Err(PipelineError::Forbidden(_))
        ));
        assert!(matches!(
            pipeline.authorize(Uuid::new_v4(), owner).await,
            Err(PipelineError::NotFound(_))
        ));
    }
}
