use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::errors::AppError;
use crate::videos::{extract_streamtape_id, now_rfc3339, Video};

const QUERY_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_millis(10000);

const VIDEO_COLUMNS: &str = "id, title, description, hashtags, streamtape_url, \
     streamtape_id, banner_path, created_at, updated_at";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://streamhub.db?mode=rwc";
const FALLBACK_DATABASE_URL: &str = "sqlite::memory:";

pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

pub fn backend_name(url: &str) -> &'static str {
    if url.starts_with("postgres") {
        "PostgreSQL"
    } else {
        "SQLite"
    }
}

/// Connects to `DATABASE_URL` (embedded SQLite when unset) and ensures the
/// schema exists. A connection failure degrades to an in-memory database so
/// the pages keep serving instead of the process refusing to start.
pub async fn init_db() -> Result<VideoStore, sqlx::Error> {
    sqlx::any::install_default_drivers();

    let url = database_url();
    tracing::info!("connecting to {} database", backend_name(&url));

    let pool = match connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(
                "could not open {} database ({}); continuing with an in-memory fallback",
                backend_name(&url),
                e
            );
            connect(FALLBACK_DATABASE_URL).await?
        }
    };

    Ok(VideoStore::new(pool))
}

async fn connect(url: &str) -> Result<AnyPool, sqlx::Error> {
    // An in-memory SQLite database exists per connection, so the pool must
    // not open a second one.
    let max_connections = if url.contains(":memory:") { 1 } else { 10 };

    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    create_schema(&pool, url).await?;
    Ok(pool)
}

async fn create_schema(pool: &AnyPool, url: &str) -> Result<(), sqlx::Error> {
    let id_column = if url.starts_with("postgres") {
        "id BIGSERIAL PRIMARY KEY"
    } else {
        "id INTEGER PRIMARY KEY AUTOINCREMENT"
    };

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            {id_column},
            title TEXT NOT NULL,
            description TEXT,
            hashtags TEXT,
            streamtape_url TEXT NOT NULL,
            streamtape_id TEXT NOT NULL,
            banner_path TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS ix_videos_title ON videos (title)",
        "CREATE INDEX IF NOT EXISTS ix_videos_streamtape_id ON videos (streamtape_id)",
        "CREATE INDEX IF NOT EXISTS ix_videos_created_at ON videos (created_at)",
        "CREATE INDEX IF NOT EXISTS ix_videos_created_title ON videos (created_at, title)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}

pub struct NewVideo {
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Option<String>,
    pub streamtape_url: String,
    pub banner_path: String,
}

pub struct VideoChanges {
    pub title: String,
    pub description: Option<String>,
    pub hashtags: Option<String>,
    pub streamtape_url: String,
    /// `None` keeps the stored banner.
    pub banner_path: Option<String>,
}

/// Persistence gateway for the `videos` table. Constructed once at startup
/// and cloned into the request state; each operation checks a pooled
/// connection out for its own lifetime only.
#[derive(Clone)]
pub struct VideoStore {
    pool: AnyPool,
}

impl VideoStore {
    pub fn new(pool: AnyPool) -> Self {
        VideoStore { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Video>, AppError> {
        let videos = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, Video>(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, title ASC"
            ))
            .fetch_all(&self.pool),
        )
        .await??;

        Ok(videos)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Video>, AppError> {
        let video = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, Video>(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await??;

        Ok(video)
    }

    /// Inserts a new record; the streamtape id is derived here so it can
    /// never diverge from the URL, and `updated_at` starts equal to
    /// `created_at`.
    pub async fn insert(&self, new_video: NewVideo) -> Result<Video, AppError> {
        let streamtape_id = extract_streamtape_id(&new_video.streamtape_url);
        let now = now_rfc3339();

        let video = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, Video>(&format!(
                r#"
                INSERT INTO videos
                    (title, description, hashtags, streamtape_url, streamtape_id,
                     banner_path, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {VIDEO_COLUMNS}
                "#
            ))
            .bind(&new_video.title)
            .bind(&new_video.description)
            .bind(&new_video.hashtags)
            .bind(&new_video.streamtape_url)
            .bind(&streamtape_id)
            .bind(&new_video.banner_path)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool),
        )
        .await??;

        Ok(video)
    }

    pub async fn update(&self, id: i64, changes: VideoChanges) -> Result<Video, AppError> {
        let streamtape_id = extract_streamtape_id(&changes.streamtape_url);
        let now = now_rfc3339();

        let video = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, Video>(&format!(
                r#"
                UPDATE videos
                SET title = $1,
                    description = $2,
                    hashtags = $3,
                    streamtape_url = $4,
                    streamtape_id = $5,
                    banner_path = COALESCE($6, banner_path),
                    updated_at = $7
                WHERE id = $8
                RETURNING {VIDEO_COLUMNS}
                "#
            ))
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(&changes.hashtags)
            .bind(&changes.streamtape_url)
            .bind(&streamtape_id)
            .bind(&changes.banner_path)
            .bind(&now)
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await??;

        video.ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query("DELETE FROM videos WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await??;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Video {} not found", id)));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let total: (i64,) = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as("SELECT COUNT(*) FROM videos").fetch_one(&self.pool),
        )
        .await??;

        Ok(total.0)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Video>, AppError> {
        let videos = tokio::time::timeout(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, Video>(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY created_at DESC, title ASC LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await??;

        Ok(videos)
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> VideoStore {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect(FALLBACK_DATABASE_URL)
        .await
        .expect("Failed to open in-memory database");
    create_schema(&pool, FALLBACK_DATABASE_URL)
        .await
        .expect("Failed to create schema");
    VideoStore::new(pool)
}
