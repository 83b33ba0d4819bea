//! SQLite-backed metadata store for video records.

use crate::models::{reference::StoredReference, video::Video};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Schema applied by `--migrate` and by tests against in-memory databases.
pub const INIT_MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

const VIDEO_COLUMNS: &str = "id, user_id, title, description, video_bucket, video_key, \
                             created_at, updated_at";

#[derive(Clone)]
pub struct VideoRepository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new record with no stored reference.
    pub async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> sqlx::Result<Video> {
        let now = Utc::now();
        sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, user_id, title, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
    }

    pub async fn get(&self, id: Uuid) -> sqlx::Result<Option<Video>> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    /// Point the record at a published object.
    ///
    /// Both halves of the reference are written in one statement. Returns
    /// `None` if the record no longer exists. Concurrent writers are not
    /// serialized; the last one wins.
    pub async fn set_reference(
        &self,
        id: Uuid,
        reference: &StoredReference,
    ) -> sqlx::Result<Option<Video>> {
        debug!(video_id = %id, key = %reference.key(), "Recording stored reference");
        sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET video_bucket = ?, video_key = ?, updated_at = ?
             WHERE id = ?
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(reference.bucket())
        .bind(reference.key())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.db)
        .await
    }
}

/// Apply the embedded schema one statement at a time.
pub async fn apply_migrations(db: &SqlitePool) -> sqlx::Result<usize> {
    let statements = INIT_MIGRATION
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(statements.len())
}

#[cfg(test)]
pub(crate) async fn memory_repository() -> VideoRepository {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    apply_migrations(&pool).await.expect("apply schema");
    VideoRepository::new(Arc::new(pool))
}
