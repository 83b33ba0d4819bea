use crate::services::{object_store::S3Settings, pipeline::PipelineConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub staging_dir: PathBuf,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub jwt_secret: Option<String>,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub tool_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub max_memory_bytes: usize,
    pub presign_ttl_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video upload and ingestion API")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VIDEO_INGEST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Root for per-upload session directories (overrides VIDEO_INGEST_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Bucket uploads are published to (overrides VIDEO_INGEST_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// S3 region (overrides VIDEO_INGEST_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint such as MinIO (overrides VIDEO_INGEST_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// HS256 secret for bearer tokens (overrides VIDEO_INGEST_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// ffmpeg binary (overrides VIDEO_INGEST_FFMPEG_PATH)
    #[arg(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// ffprobe binary (overrides VIDEO_INGEST_FFPROBE_PATH)
    #[arg(long)]
    pub ffprobe_path: Option<PathBuf>,

    /// Seconds a single ffmpeg/ffprobe run may take (overrides VIDEO_INGEST_TOOL_TIMEOUT_SECS)
    #[arg(long)]
    pub tool_timeout_secs: Option<u64>,

    /// Upload request body ceiling (overrides VIDEO_INGEST_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// In-memory buffer while streaming to disk (overrides VIDEO_INGEST_MAX_MEMORY_BYTES)
    #[arg(long)]
    pub max_memory_bytes: Option<usize>,

    /// Lifetime of signed URLs (overrides VIDEO_INGEST_PRESIGN_TTL_SECS)
    #[arg(long)]
    pub presign_ttl_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 1 << 30;
const DEFAULT_MAX_MEMORY_BYTES: usize = 32 << 20;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Merge: flag, then environment, then default ---
        let cfg = Self {
            host: args
                .host
                .unwrap_or(env_string("VIDEO_INGEST_HOST")?.unwrap_or_else(|| "0.0.0.0".into())),
            port: or_env(args.port, "VIDEO_INGEST_PORT", 8091)?,
            database_url: args.database_url.unwrap_or(
                env_string("VIDEO_INGEST_DATABASE_URL")?
                    .unwrap_or_else(|| "sqlite://./data/videos.db".into()),
            ),
            staging_dir: or_env(args.staging_dir, "VIDEO_INGEST_STAGING_DIR", env::temp_dir())?,
            s3_bucket: args.s3_bucket.or(env_string("VIDEO_INGEST_S3_BUCKET")?),
            s3_region: args.s3_region.unwrap_or(
                env_string("VIDEO_INGEST_S3_REGION")?.unwrap_or_else(|| "us-east-1".into()),
            ),
            s3_endpoint: args.s3_endpoint.or(env_string("VIDEO_INGEST_S3_ENDPOINT")?),
            jwt_secret: args.jwt_secret.or(env_string("VIDEO_INGEST_JWT_SECRET")?),
            ffmpeg_path: or_env(args.ffmpeg_path, "VIDEO_INGEST_FFMPEG_PATH", "ffmpeg".into())?,
            ffprobe_path: or_env(args.ffprobe_path, "VIDEO_INGEST_FFPROBE_PATH", "ffprobe".into())?,
            tool_timeout_secs: or_env(args.tool_timeout_secs, "VIDEO_INGEST_TOOL_TIMEOUT_SECS", 300)?,
            max_upload_bytes: or_env(
                args.max_upload_bytes,
                "VIDEO_INGEST_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            max_memory_bytes: or_env(
                args.max_memory_bytes,
                "VIDEO_INGEST_MAX_MEMORY_BYTES",
                DEFAULT_MAX_MEMORY_BYTES,
            )?,
            presign_ttl_secs: or_env(args.presign_ttl_secs, "VIDEO_INGEST_PRESIGN_TTL_SECS", 900)?,
        };

        if cfg.max_memory_bytes == 0 {
            anyhow::bail!("max_memory_bytes must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bucket(&self) -> Result<&str> {
        self.s3_bucket
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .context("an S3 bucket is required (--s3-bucket or VIDEO_INGEST_S3_BUCKET)")
    }

    pub fn jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .context("a JWT secret is required (--jwt-secret or VIDEO_INGEST_JWT_SECRET)")
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            staging_dir: self.staging_dir.clone(),
            bucket: self.bucket()?.to_string(),
            max_upload_bytes: self.max_upload_bytes,
            max_memory_bytes: self.max_memory_bytes,
            presign_ttl: Duration::from_secs(self.presign_ttl_secs),
        })
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.s3_region.clone(),
            endpoint: self.s3_endpoint.clone(),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

// The secret stays out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("staging_dir", &self.staging_dir)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_memory_bytes", &self.max_memory_bytes)
            .field("presign_ttl_secs", &self.presign_ttl_secs)
            .finish()
    }
}

fn env_string(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// Use the flag when given, otherwise parse `name` from the environment,
/// otherwise fall back to `default`.
fn or_env<T>(flag: Option<T>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match env_string(name)? {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}
