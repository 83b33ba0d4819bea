//! Remote object store: single-shot uploads, presigned reads, compensating deletes.

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::Region,
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use std::{path::Path, time::Duration, time::Instant};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open upload body {path}: {reason}")]
    Body { path: String, reason: String },
    #[error("upload of `{key}` to `{bucket}` failed: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("presigning `{key}` in `{bucket}` failed: {reason}")]
    Presign {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("delete of `{key}` from `{bucket}` failed: {reason}")]
    Delete {
        bucket: String,
        key: String,
        reason: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the whole file at `path` as one object. No multipart upload:
    /// the store ends up with either the complete object or nothing.
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()>;

    /// Time-limited GET URL for an existing object.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
    -> StoreResult<String>;

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;
}

/// Connection settings for an S3 or S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint (MinIO, R2, ...); path-style addressing is used when set.
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default credential chain plus `settings`.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StoreResult<()> {
        let started = Instant::now();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Body {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "S3 upload failed"
                );
                StoreError::Upload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?;

        info!(
            bucket = %bucket,
            key = %key,
            duration_ms = started.elapsed().as_millis() as u64,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presign_err = |reason: String| StoreError::Presign {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| presign_err(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
