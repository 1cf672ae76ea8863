//! Audio source abstraction for Shadowify.
//!
//! Turns a user-supplied YouTube reference into a video id, and defines the
//! trait through which audio and metadata are fetched for that id.

mod youtube;

pub use youtube::{normalize_reference, watch_url};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Metadata emitted by the downloader for one video.
///
/// Field names follow yt-dlp's info JSON. Anything missing defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeMetadata {
    pub id: String,
    pub title: String,
    #[serde(rename = "fulltitle")]
    pub full_title: String,
    pub description: String,
    #[serde(deserialize_with = "de_duration")]
    pub duration: u32,
    pub duration_string: String,
    pub thumbnail: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// yt-dlp reports duration as a number that may be fractional or null.
fn de_duration<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.filter(|d| d.is_finite() && *d > 0.0).map(|d| d as u32).unwrap_or(0))
}

/// A temporary audio file owned by exactly one run.
///
/// The file lives in a directory of its own, which goes with it. Call
/// [`remove`](Self::remove) once the file is no longer needed. If the run is
/// aborted before that, dropping the guard removes both instead.
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
    run_dir: Option<TempDir>,
    removed: bool,
}

impl TempAudioFile {
    /// Take ownership of `path` together with the run directory holding it.
    pub fn new(run_dir: TempDir, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_dir: Some(run_dir),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Failures are logged, never returned.
    pub fn remove(mut self) {
        self.removed = true;
        remove_logged(&self.path);
        if let Some(dir) = self.run_dir.take() {
            let dir_path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to cleanup run directory {:?}: {}", dir_path, e);
            }
        }
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        if !self.removed {
            debug!("Removing abandoned audio file {:?}", self.path);
            remove_logged(&self.path);
        }
    }
}

fn remove_logged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed temporary audio file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to cleanup audio file {:?}: {}", path, e),
    }
}

/// Result of fetching a video: its metadata and the local audio file.
#[derive(Debug)]
pub struct FetchedMedia {
    pub metadata: YoutubeMetadata,
    pub audio: TempAudioFile,
}

/// Trait for media fetchers.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download audio and metadata for a YouTube video id.
    async fn fetch(&self, youtube_id: &str) -> Result<FetchedMedia>;
}
