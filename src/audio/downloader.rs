//! Audio download via yt-dlp.
//!
//! Each fetch downloads into its own directory under the temp directory, so
//! concurrent runs never share files and nothing is named after the caller's
//! input.

use crate::audio_source::{watch_url, FetchedMedia, MediaFetcher, TempAudioFile, YoutubeMetadata};
use crate::config::DownloaderSettings;
use crate::error::{Result, ShadowifyError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// File stem of every download inside its run directory.
const AUDIO_STEM: &str = "audio";

/// Media fetcher backed by the yt-dlp command line tool.
pub struct YtDlpFetcher {
    binary: String,
    audio_format: String,
    extra_args: Vec<String>,
    output_dir: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(settings: &DownloaderSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: settings.binary.clone(),
            audio_format: settings.audio_format.clone(),
            extra_args: settings.extra_args.clone(),
            output_dir: output_dir.into(),
        }
    }

    /// Create a fresh directory owned by one fetch.
    async fn run_dir(&self) -> Result<TempDir> {
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            ShadowifyError::Fetch(format!("cannot create {}: {}", self.output_dir.display(), e))
        })?;

        tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(&self.output_dir)
            .map_err(|e| {
                ShadowifyError::Fetch(format!(
                    "cannot create run directory in {}: {}",
                    self.output_dir.display(),
                    e
                ))
            })
    }

    fn audio_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(format!("{}.{}", AUDIO_STEM, self.audio_format))
    }

    fn command(&self, video_id: &str, run_dir: &Path) -> Command {
        let template = run_dir.join(format!("{}.%(ext)s", AUDIO_STEM));

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--extract-audio")
            .arg("--audio-format").arg(&self.audio_format)
            .arg("--output").arg(&template)
            .arg("--print-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .args(&self.extra_args)
            .arg(watch_url(video_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    #[instrument(skip(self), fields(video_id = %youtube_id))]
    async fn fetch(&self, youtube_id: &str) -> Result<FetchedMedia> {
        // Dropping the directory on an early return takes partial downloads with it
        let run_dir = self.run_dir().await?;

        info!("Downloading audio from {}", watch_url(youtube_id));

        let output = match self.command(youtube_id, run_dir.path()).output().await {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShadowifyError::Fetch(format!("{} not found in PATH", self.binary)));
            }
            Err(e) => {
                return Err(ShadowifyError::Fetch(format!("{} execution failed: {e}", self.binary)));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShadowifyError::Fetch(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let audio_path = self.audio_path(run_dir.path());
        if !audio_path.is_file() {
            return Err(ShadowifyError::Fetch(format!(
                "audio file not found after download: {}",
                audio_path.display()
            )));
        }

        let sidecar = run_dir.path().join(format!("{}.info.json", AUDIO_STEM));
        let audio = TempAudioFile::new(run_dir, audio_path);

        let metadata = match parse_metadata_stdout(&output.stdout) {
            Some(m) => m,
            None => read_sidecar(&sidecar).await?,
        };

        debug!("Fetched metadata for '{}' ({}s)", metadata.title, metadata.duration);
        Ok(FetchedMedia { metadata, audio })
    }
}

/// Parse metadata from yt-dlp's standard output.
///
/// The whole buffer is tried as one JSON document first; when other lines are
/// interleaved, the first line that parses wins.
pub fn parse_metadata_stdout(stdout: &[u8]) -> Option<YoutubeMetadata> {
    if let Ok(metadata) = serde_json::from_slice::<YoutubeMetadata>(stdout) {
        return Some(metadata);
    }

    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<YoutubeMetadata>(line).ok())
}

/// Read and remove the `.info.json` sidecar written next to the audio.
async fn read_sidecar(path: &Path) -> Result<YoutubeMetadata> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        ShadowifyError::Fetch(format!(
            "no metadata on stdout and sidecar {} unreadable: {}",
            path.display(),
            e
        ))
    })?;

    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove metadata sidecar {:?}: {}", path, e);
    }

    serde_json::from_str(&content)
        .map_err(|e| ShadowifyError::Fetch(format!("unparsable metadata in {}: {}", path.display(), e)))
}
