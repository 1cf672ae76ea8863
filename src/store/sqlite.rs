//! SQLite-based video store implementation.
//!
//! Uniqueness of `youtube_id` and segment time bounds are enforced by the
//! schema, so they hold no matter how many pipelines write concurrently.

use super::{NewSegment, NewVideo, Page, Pagination, Segment, SqlFilter, Video, VideoFilter, VideoSort, VideoStore};
use crate::error::{Result, ShadowifyError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        id TEXT PRIMARY KEY,
        youtube_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        full_title TEXT NOT NULL,
        description TEXT NOT NULL,
        duration INTEGER NOT NULL CHECK (duration >= 0),
        duration_string TEXT NOT NULL,
        thumbnail TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        categories TEXT NOT NULL DEFAULT '[]',
        view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
        difficulty TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_videos_created_at ON videos(created_at);
    CREATE INDEX IF NOT EXISTS idx_videos_view_count ON videos(view_count);

    CREATE TABLE IF NOT EXISTS segments (
        id TEXT PRIMARY KEY,
        video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        start_sec REAL NOT NULL,
        end_sec REAL NOT NULL,
        content TEXT NOT NULL,
        difficulty TEXT,
        position INTEGER NOT NULL,
        CHECK (start_sec >= 0 AND end_sec >= start_sec)
    );

    CREATE INDEX IF NOT EXISTS idx_segments_video_id ON segments(video_id, start_sec, position);
"#;

const VIDEO_COLUMNS: &str = "id, youtube_id, title, full_title, description, duration, \
     duration_string, thumbnail, tags, categories, view_count, difficulty, created_at, updated_at";

const SEGMENT_COLUMNS: &str = "id, video_id, start_sec, end_sec, content, difficulty, position";

/// SQLite-based video store.
pub struct SqliteVideoStore {
    conn: Mutex<Connection>,
}

impl SqliteVideoStore {
    /// Open (or create) the database file.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::with_connection(conn)?;

        info!("Initialized SQLite video store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        super::search::register_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ShadowifyError::Internal(format!("Failed to acquire lock: {}", e)))
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    let tags: String = row.get(8)?;
    let categories: String = row.get(9)?;
    let view_count: i64 = row.get(10)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Video {
        id: row.get(0)?,
        youtube_id: row.get(1)?,
        title: row.get(2)?,
        full_title: row.get(3)?,
        description: row.get(4)?,
        duration: row.get(5)?,
        duration_string: row.get(6)?,
        thumbnail: row.get(7)?,
        tags: parse_list(&tags),
        categories: parse_list(&categories),
        view_count: view_count.max(0) as u64,
        difficulty: row.get(11)?,
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
    })
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        video_id: row.get(1)?,
        start_sec: row.get(2)?,
        end_sec: row.get(3)?,
        content: row.get(4)?,
        difficulty: row.get(5)?,
        position: row.get(6)?,
    })
}

/// Unique violations mean another row already holds this YouTube id.
fn map_insert_error(youtube_id: &str, err: rusqlite::Error) -> ShadowifyError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            ShadowifyError::AlreadyExists(youtube_id.to_string())
        }
        _ => ShadowifyError::Persist(err.to_string()),
    }
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl VideoStore for SqliteVideoStore {
    #[instrument(skip(self))]
    async fn find_by_youtube_id(&self, youtube_id: &str) -> Result<Option<Video>> {
        let conn = self.conn()?;
        optional(conn.query_row(
            &format!("SELECT {} FROM videos WHERE youtube_id = ?1", VIDEO_COLUMNS),
            params![youtube_id],
            video_from_row,
        ))
    }

    #[instrument(skip(self, video, segments), fields(youtube_id = %video.youtube_id, segments = segments.len()))]
    async fn create_with_segments(&self, video: &NewVideo, segments: &[NewSegment]) -> Result<String> {
        let conn = self.conn()?;
        let video_id = Uuid::new_v4().to_string();
        let now = now_string();

        let tags = serde_json::to_string(&video.tags)?;
        let categories = serde_json::to_string(&video.categories)?;

        let write = || -> rusqlite::Result<()> {
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                r#"
                INSERT INTO videos
                (id, youtube_id, title, full_title, description, duration, duration_string,
                 thumbnail, tags, categories, view_count, difficulty, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12, ?12)
                "#,
                params![
                    video_id,
                    video.youtube_id,
                    video.title,
                    video.full_title,
                    video.description,
                    video.duration,
                    video.duration_string,
                    video.thumbnail,
                    tags,
                    categories,
                    video.difficulty,
                    now,
                ],
            )?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO segments
                    (id, video_id, start_sec, end_sec, content, difficulty, position)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )?;

                for (position, segment) in segments.iter().enumerate() {
                    stmt.execute(params![
                        Uuid::new_v4().to_string(),
                        video_id,
                        segment.start_sec,
                        segment.end_sec,
                        segment.content,
                        segment.difficulty,
                        position as i64,
                    ])?;
                }
            }

            tx.commit()
        };

        write().map_err(|e| map_insert_error(&video.youtube_id, e))?;

        info!("Stored video {} with {} segments", video_id, segments.len());
        Ok(video_id)
    }

    #[instrument(skip(self))]
    async fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let conn = self.conn()?;
        optional(conn.query_row(
            &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
            params![id],
            video_from_row,
        ))
    }

    #[instrument(skip(self))]
    async fn increment_view_count(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE videos SET view_count = view_count + 1, updated_at = ?1 WHERE id = ?2",
            params![now_string(), id],
        )?;

        debug!("Incremented view count for {} ({} rows)", id, updated);
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    async fn list_videos(&self, filter: &VideoFilter, pagination: Pagination) -> Result<Page<Video>> {
        let conn = self.conn()?;
        let SqlFilter { clause, mut params } = SqlFilter::from_filter(filter);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM videos {}", clause),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        let order = match filter.sort {
            VideoSort::Latest => "created_at DESC, rowid DESC",
            VideoSort::Popular => "view_count DESC, created_at DESC, rowid DESC",
        };

        params.push(Value::Integer(pagination.limit() as i64));
        params.push(Value::Integer(pagination.offset() as i64));

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos {} ORDER BY {} LIMIT ? OFFSET ?",
            VIDEO_COLUMNS, clause, order
        ))?;

        let items = stmt
            .query_map(params_from_iter(params.iter()), video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Listed {} of {} videos", items.len(), total);
        Ok(Page {
            items,
            total: total.max(0) as u64,
            pagination,
        })
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT json_each.value
            FROM videos, json_each(videos.categories)
            WHERE json_each.type = 'text'
            ORDER BY 1
            "#,
        )?;

        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn segments_for_video(&self, video_id: &str) -> Result<Vec<Segment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM segments WHERE video_id = ?1 ORDER BY start_sec ASC, position ASC",
            SEGMENT_COLUMNS
        ))?;

        let segments = stmt
            .query_map(params![video_id], segment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Found {} segments for video {}", segments.len(), video_id);
        Ok(segments)
    }

    #[instrument(skip(self))]
    async fn get_segment(&self, id: &str) -> Result<Option<Segment>> {
        let conn = self.conn()?;
        optional(conn.query_row(
            &format!("SELECT {} FROM segments WHERE id = ?1", SEGMENT_COLUMNS),
            params![id],
            segment_from_row,
        ))
    }
}
