//! Transcription module for Shadowify.
//!
//! Speech recognition runs in two modes against the same local audio file:
//! a cheap language-detection pass that gates ingestion, and the full
//! transcription pass that produces timed segments. Learner recordings get a
//! third, plain-text pass.

mod models;
mod whisper;

pub use models::{format_timestamp, Transcript, TranscriptSegment};
pub use whisper::{parse_detection_output, parse_text_output, parse_transcription_output, WhisperCli};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for speech recognition engines.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Detect the spoken language and return its code (e.g. `en`).
    async fn detect_language(&self, audio_path: &Path) -> Result<String>;

    /// Transcribe an audio file into ordered, timed segments.
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;

    /// Transcribe a short recording to plain text, without timestamps.
    async fn transcribe_text(&self, audio_path: &Path) -> Result<String>;
}
