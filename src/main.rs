use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use video_ingest::{
    config::AppConfig,
    routes,
    services::{
        auth::TokenVerifier,
        materializer::ReferenceMaterializer,
        media::FfmpegToolkit,
        object_store::S3ObjectStore,
        pipeline::UploadPipeline,
        video_repository::{VideoRepository, apply_migrations},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-ingest with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if !db_path.starts_with(":memory:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?
        .create_if_missing(true);
    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        let applied = apply_migrations(&db).await?;
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(()); // exit after migration
    }

    // --- Ensure staging directory exists ---
    if !cfg.staging_dir.exists() {
        fs::create_dir_all(&cfg.staging_dir)?;
        tracing::info!("Created staging directory at {}", cfg.staging_dir.display());
    }

    // --- Initialize collaborators ---
    let pipeline_config = cfg.pipeline()?;
    let presign_ttl = pipeline_config.presign_ttl;
    let app_routes = routes::routes::routes(&pipeline_config);
    let tokens = TokenVerifier::new(cfg.jwt_secret()?);
    let store = Arc::new(S3ObjectStore::connect(&cfg.s3_settings()).await);
    let toolkit = Arc::new(FfmpegToolkit::new(
        cfg.ffmpeg_path.clone(),
        cfg.ffprobe_path.clone(),
        cfg.tool_timeout(),
    ));
    let videos = VideoRepository::new(db.clone());

    let state = AppState {
        videos: videos.clone(),
        pipeline: Arc::new(UploadPipeline::new(
            pipeline_config,
            toolkit,
            store.clone(),
            videos,
        )),
        materializer: ReferenceMaterializer::new(store, presign_ttl),
        tokens,
    };

    // --- Build router ---
    let app: Router = app_routes.with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
