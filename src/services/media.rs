//! External media tooling: fast-start remuxing and stream inspection.
//!
//! The pipeline only sees the [`MediaToolkit`] trait. [`FfmpegToolkit`]
//! implements it by shelling out to `ffmpeg` / `ffprobe` with bounded
//! execution time; a library-linked backend can replace it without touching
//! pipeline code.

use async_trait::async_trait;
use serde::Deserialize;
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with status {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} reported success but wrote no output at {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no stream reported a usable width and height")]
    NoGeometry,
}

/// Pixel dimensions of a stream; both sides strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Rewrite `input` into `output` with the index moved to the head of the
    /// file, copying streams without re-encoding.
    async fn remux_fast_start(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Geometry of the first stream with a positive width and height.
    async fn inspect(&self, input: &Path) -> MediaResult<Geometry>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` and `ffprobe` command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Run `program` to completion, killing it if it outlives the timeout.
    async fn run(&self, program: &Path, args: Vec<OsString>) -> MediaResult<Output> {
        let tool = program.display().to_string();
        debug!("Running {} {:?}", tool, args);

        let started = Instant::now();
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| MediaError::Spawn {
                tool: tool.clone(),
                source,
            })?,
            Err(_) => {
                warn!("{} timed out after {:?}, killing process", tool, self.timeout);
                return Err(MediaError::Timeout {
                    tool,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(MediaError::Failed {
                tool,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            "{} finished", tool
        );
        Ok(output)
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn remux_fast_start(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.run(&self.ffmpeg, remux_args(input, output)).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::MissingOutput {
                tool: self.ffmpeg.display().to_string(),
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }

    async fn inspect(&self, input: &Path) -> MediaResult<Geometry> {
        let output = self.run(&self.ffprobe, probe_args(input)).await?;
        parse_geometry(&output.stdout)
    }
}

/// `-i <input> -c copy -movflags faststart -f mp4 <output>`
fn remux_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
    args.extend(
        ["-c", "copy", "-movflags", "faststart", "-f", "mp4"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// `-v error -print_format json -show_streams <input>`
fn probe_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-print_format", "json", "-show_streams"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.into());
    args
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<i64>,
    height: Option<i64>,
}

fn parse_geometry(stdout: &[u8]) -> MediaResult<Geometry> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    probe
        .streams
        .iter()
        .find_map(|stream| {
            let width = u32::try_from(stream.width?).ok()?;
            let height = u32::try_from(stream.height?).ok()?;
            Geometry::new(width, height)
        })
        .ok_or(MediaError::NoGeometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remux_argv() {
        let args = remux_args(Path::new("/tmp/in.mp4"), Path::new("/tmp/out.mp4"));
        let expected = [
            "-i",
            "/tmp/in.mp4",
            "-c",
            "copy",
            "-movflags",
            "faststart",
            "-f",
            "mp4",
            "/tmp/out.mp4",
        ];
        assert_eq!(args, expected.map(OsString::from));
    }

    #[test]
    fn probe_argv() {
        let args = probe_args(Path::new("/tmp/in.mp4"));
        let expected = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "/tmp/in.mp4",
        ];
        assert_eq!(args, expected.map(OsString::from));
    }

    #[test]
    fn geometry_comes_from_first_sized_stream() {
        let json = br#"{"streams":[
            {"codec_type":"audio","index":0},
            {"codec_type":"video","width":0,"height":0},
            {"codec_type":"video","width":1920,"height":1080},
            {"codec_type":"video","width":640,"height":480}
        ]}"#;
        assert_eq!(
            parse_geometry(json).unwrap(),
            Geometry {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn negative_or_missing_dimensions_are_skipped() {
        let json = br#"{"streams":[{"width":-1,"height":720},{"width":720}]}"#;
        assert!(matches!(parse_geometry(json), Err(MediaError::NoGeometry)));
    }

    #[test]
    fn no_streams_is_no_geometry() {
        assert!(matches!(parse_geometry(b"{}"), Err(MediaError::NoGeometry)));
        assert!(matches!(
            parse_geometry(br#"{"streams":[]}"#),
            Err(MediaError::NoGeometry)
        ));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        assert!(matches!(parse_geometry(b"not json"), Err(MediaError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let toolkit = FfmpegToolkit::new(
            "/nonexistent/ffmpeg",
            "/nonexistent/ffprobe",
            Duration::from_secs(5),
        );
        let err = toolkit.inspect(Path::new("/tmp/in.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported_with_code() {
        let toolkit = FfmpegToolkit::new("false", "false", Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let err = toolkit
            .remux_fast_start(&dir.path().join("in.mp4"), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        match err {
            MediaError::Failed { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_is_killed_at_the_timeout() {
        let toolkit = FfmpegToolkit::new("sleep", "sleep", Duration::from_millis(100));
        let err = toolkit
            .run(Path::new("sleep"), vec!["5".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_tool_without_output_file_is_rejected() {
        let toolkit = FfmpegToolkit::new("true", "true", Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let err = toolkit
            .remux_fast_start(&dir.path().join("in.mp4"), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingOutput { .. }));
    }
}
