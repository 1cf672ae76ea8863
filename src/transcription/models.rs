//! Data models for transcription.

use serde::{Deserialize, Serialize};

/// A complete transcript with segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Individual transcript segments, in engine output order.
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment texts in order, as submitted for classification.
    pub fn texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text.clone()).collect()
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }

    /// Build a segment from engine offsets in milliseconds.
    pub fn from_offsets_ms(from_ms: f64, to_ms: f64, text: &str) -> Self {
        Self::new(from_ms / 1000.0, to_ms / 1000.0, text.trim())
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
