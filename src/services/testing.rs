//! In-process stand-ins for the object store and the media tools.

use crate::services::{
    media::{Geometry, MediaError, MediaResult, MediaToolkit},
    object_store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store keeping bodies in a map. Presigned URLs look like
/// `memory://{bucket}/{key}?expires={secs}&sig={n}` with `n` increasing.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    signatures: AtomicU64,
    fail_put: AtomicBool,
    fail_presign: AtomicBool,
    fail_delete: AtomicBool,
}

impl MemoryObjectStore {
    pub fn fail_put(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub fn fail_presign(&self) {
        self.fail_presign.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn objects(&self) -> HashMap<(String, String), StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    /// `memory://bucket/key` part of a URL minted by this store.
    pub fn object_of(url: &str) -> &str {
        url.split_once('?').map(|(object, _)| object).unwrap_or(url)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        let body = tokio::fs::read(path).await.map_err(|e| StoreError::Body {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StoreError::Presign {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        let sig = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "memory://{bucket}/{key}?expires={}&sig={sig}",
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Toolkit that "remuxes" by prefixing the input with a marker and reports
/// a fixed geometry, or an inspection failure when none is set.
pub struct FakeToolkit {
    pub geometry: Option<Geometry>,
    pub fail_remux: bool,
}

impl FakeToolkit {
    pub const REMUX_MARKER: &'static [u8] = b"faststart:";

    pub fn with_geometry(width: u32, height: u32) -> Self {
        Self {
            geometry: Geometry::new(width, height),
            fail_remux: false,
        }
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn remux_fast_start(&self, input: &Path, output: &Path) -> MediaResult<()> {
        if self.fail_remux {
            return Err(MediaError::Failed {
                tool: "ffmpeg".into(),
                code: Some(1),
                stderr: "moov atom not found".into(),
            });
        }
        let mut body = Self::REMUX_MARKER.to_vec();
        body.extend(tokio::fs::read(input).await.map_err(|source| MediaError::Spawn {
            tool: "ffmpeg".into(),
            source,
        })?);
        tokio::fs::write(output, body)
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "ffmpeg".into(),
                source,
            })
    }

    async fn inspect(&self, _input: &Path) -> MediaResult<Geometry> {
        self.geometry.ok_or(MediaError::NoGeometry)
    }
}
