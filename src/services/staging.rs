//! Request-scoped local staging of uploaded and processed media.
//!
//! An [`UploadSession`] owns a uniquely named directory under the staging
//! root. Both artifacts live inside it, and dropping the session removes the
//! directory, whichever way the request ends.

use crate::errors::PipelineError;
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use mime::Mime;
use std::{
    io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

const SESSION_PREFIX: &str = "video-ingest-";
const ORIGINAL_NAME: &str = "original.mp4";
const PROCESSED_NAME: &str = "processed.mp4";

#[derive(Debug)]
pub struct UploadSession {
    dir: TempDir,
    original: PathBuf,
    processed: PathBuf,
    media_type: Mime,
    staged_bytes: u64,
}

impl UploadSession {
    /// Reserve a fresh session directory under `root`.
    pub fn create(root: &Path, media_type: Mime) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SESSION_PREFIX)
            .tempdir_in(root)?;
        let original = dir.path().join(ORIGINAL_NAME);
        let processed = dir.path().join(PROCESSED_NAME);
        debug!("Created upload session at {}", dir.path().display());

        Ok(Self {
            dir,
            original,
            processed,
            media_type,
            staged_bytes: 0,
        })
    }

    /// Copy an inbound byte stream into the original artifact. Downstream
    /// stages reopen it by path.
    ///
    /// At most `buffer_bytes` are held in memory before being flushed to
    /// disk. Stream errors come from the request body (oversize, truncated
    /// form) and are reported as input validation failures; write errors are
    /// staging failures.
    pub async fn stage_stream<S, E>(
        &mut self,
        stream: S,
        buffer_bytes: usize,
    ) -> Result<u64, PipelineError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let file = File::create(&self.original)
            .await
            .map_err(|e| PipelineError::staging("Failed to create temp file", e))?;
        let mut writer = BufWriter::with_capacity(buffer_bytes, file);

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| PipelineError::invalid_with("Error parsing form data", e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| PipelineError::staging("Failed to save video to temp file", e))?;
            self.staged_bytes += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| PipelineError::staging("Failed to save video to temp file", e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| PipelineError::staging("Failed to save video to temp file", e))?;

        debug!(
            bytes = self.staged_bytes,
            "Staged upload at {}",
            self.original.display()
        );
        Ok(self.staged_bytes)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// Destination for the remuxed artifact. Only meaningful once the
    /// remuxer has reported success.
    pub fn processed_path(&self) -> &Path {
        &self.processed
    }

    pub fn media_type(&self) -> &Mime {
        &self.media_type
    }

    pub fn staged_bytes(&self) -> u64 {
        self.staged_bytes
    }
}
