//! Shadowify - YouTube ingestion for language learners
//!
//! Turns a YouTube video into study material: the audio is downloaded, the
//! spoken language is checked, speech is transcribed into timed segments, and
//! every segment is graded on the CEFR scale before the video and its
//! segments are stored together.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `audio_source` - Reference normalization and the media fetcher trait
//! - `audio` - yt-dlp based media fetching
//! - `transcription` - Language detection and speech-to-text via whisper.cpp
//! - `difficulty` - Sentence difficulty classification
//! - `store` - Video and segment persistence
//! - `background` - Tracked fire-and-forget jobs
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use shadowify::config::Settings;
//! use shadowify::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let outcome = orchestrator.ingest("https://youtu.be/dQw4w9WgXcQ").await?;
//!     println!("Stored {} with {} segments", outcome.video_id, outcome.segment_count);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod audio_source;
pub mod background;
pub mod cli;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod orchestrator;
pub mod store;
pub mod transcription;

pub use error::{Result, ShadowifyError};
