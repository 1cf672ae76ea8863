//! Video and segment storage for Shadowify.
//!
//! Provides a trait-based interface so the pipeline can be exercised against
//! an in-memory database in tests.

mod search;
mod sqlite;

pub use search::{search_terms, SqlFilter};
pub use sqlite::SqliteVideoStore;

use crate::audio_source::YoutubeMetadata;
use crate::error::Result;
use crate::transcription::format_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub youtube_id: String,
    pub title: String,
    pub full_title: String,
    pub description: String,
    /// Length in seconds.
    pub duration: u32,
    pub duration_string: String,
    pub thumbnail: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub view_count: u64,
    /// Aggregate difficulty across all segments.
    pub difficulty: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A timed, difficulty-labelled slice of a video's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub video_id: String,
    pub start_sec: f64,
    pub end_sec: f64,
    pub content: String,
    pub difficulty: Option<String>,
    /// Index in the transcriber's output order.
    pub position: u32,
}

/// Video fields known before persistence. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub youtube_id: String,
    pub title: String,
    pub full_title: String,
    pub description: String,
    pub duration: u32,
    pub duration_string: String,
    pub thumbnail: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub difficulty: Option<String>,
}

impl NewVideo {
    /// Map downloader metadata field-for-field.
    pub fn from_metadata(youtube_id: &str, metadata: &YoutubeMetadata) -> Self {
        let duration_string = if metadata.duration_string.is_empty() {
            format_timestamp(metadata.duration as f64)
        } else {
            metadata.duration_string.clone()
        };

        Self {
            youtube_id: youtube_id.to_string(),
            title: metadata.title.clone(),
            full_title: metadata.full_title.clone(),
            description: metadata.description.clone(),
            duration: metadata.duration,
            duration_string,
            thumbnail: metadata.thumbnail.clone(),
            tags: metadata.tags.clone(),
            categories: metadata.categories.clone(),
            difficulty: None,
        }
    }
}

/// Segment fields known before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSegment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub content: String,
    pub difficulty: Option<String>,
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSort {
    /// Newest first.
    #[default]
    Latest,
    /// Most viewed first, newest first among equals.
    Popular,
}

impl std::str::FromStr for VideoSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "latest" => Ok(VideoSort::Latest),
            "popular" => Ok(VideoSort::Popular),
            other => Err(format!("Unknown sort order: {}", other)),
        }
    }
}

/// Criteria for listing videos.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Free-text query; every term must match title, full title or description.
    pub q: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
    pub sort: VideoSort,
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Clamp raw values: page below 1 becomes 1, a page size outside
    /// `1..=100` becomes the default.
    pub fn new(page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = if (1..=Self::MAX_PAGE_SIZE).contains(&page_size) {
            page_size
        } else {
            Self::DEFAULT_PAGE_SIZE
        };
        Self { page, page_size }
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size as u64)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
}

/// Trait for video store implementations.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Look up a video by its YouTube id.
    async fn find_by_youtube_id(&self, youtube_id: &str) -> Result<Option<Video>>;

    /// Insert a video and all of its segments atomically; returns the new video id.
    ///
    /// A second video with the same YouTube id fails with `AlreadyExists`.
    async fn create_with_segments(&self, video: &NewVideo, segments: &[NewSegment]) -> Result<String>;

    async fn get_video(&self, id: &str) -> Result<Option<Video>>;

    /// Add one view. Returns false when the video does not exist.
    async fn increment_view_count(&self, id: &str) -> Result<bool>;

    async fn list_videos(&self, filter: &VideoFilter, pagination: Pagination) -> Result<Page<Video>>;

    /// Distinct categories across all videos, sorted.
    async fn categories(&self) -> Result<Vec<String>>;

    /// Segments of a video, ordered by start time.
    async fn segments_for_video(&self, video_id: &str) -> Result<Vec<Segment>>;

    async fn get_segment(&self, id: &str) -> Result<Option<Segment>>;
}
