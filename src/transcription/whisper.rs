//! whisper.cpp command line implementation.
//!
//! `whisper-cli -oj` writes its result next to the input as `<audio>.json`.
//! Every pass reads that file, parses it, and removes it again.

use super::{SpeechRecognizer, Transcript, TranscriptSegment};
use crate::config::{Settings, WhisperSettings};
use crate::error::{Result, ShadowifyError};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Speech recognizer backed by the whisper.cpp `whisper-cli` binary.
pub struct WhisperCli {
    binary: PathBuf,
    detect_model: PathBuf,
    transcribe_model: PathBuf,
    recording_model: PathBuf,
    threads: usize,
    word_threshold: f32,
    split_on_word: bool,
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Detect,
    Transcribe,
    /// Plain text of a learner recording, any language.
    Recording,
}

impl Pass {
    fn error(self, msg: String) -> ShadowifyError {
        match self {
            Pass::Detect => ShadowifyError::Detection(msg),
            Pass::Transcribe | Pass::Recording => ShadowifyError::Transcription(msg),
        }
    }
}

impl WhisperCli {
    pub fn new(settings: &WhisperSettings) -> Self {
        Self {
            binary: Settings::expand_path(&settings.binary),
            detect_model: Settings::expand_path(&settings.detect_model),
            transcribe_model: Settings::expand_path(&settings.transcribe_model),
            recording_model: Settings::expand_path(&settings.recording_model),
            threads: settings.effective_threads(),
            word_threshold: settings.word_threshold,
            split_on_word: settings.split_on_word,
        }
    }

    fn args(&self, pass: Pass, audio_path: &Path) -> Vec<OsString> {
        let model = match pass {
            Pass::Detect => &self.detect_model,
            Pass::Transcribe => &self.transcribe_model,
            Pass::Recording => &self.recording_model,
        };

        let mut args: Vec<OsString> = vec![
            "-m".into(),
            model.into(),
            "-f".into(),
            audio_path.into(),
            "-np".into(),
            "-t".into(),
            self.threads.to_string().into(),
            "-oj".into(),
        ];

        match pass {
            Pass::Detect => args.push("-dl".into()),
            Pass::Transcribe => {
                if self.split_on_word {
                    args.push("-sow".into());
                }
                args.push("-wt".into());
                args.push(self.word_threshold.to_string().into());
            }
            Pass::Recording => {
                args.push("-nt".into());
                args.push("-l".into());
                args.push("auto".into());
            }
        }
        args
    }

    /// Run one pass and return the raw JSON it wrote.
    async fn run(&self, pass: Pass, audio_path: &Path) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(self.args(pass, audio_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(pass.error(format!("{} not found", self.binary.display())));
            }
            Err(e) => {
                return Err(pass.error(format!("failed to run {}: {e}", self.binary.display())));
            }
        };

        let json_path = sidecar_path(audio_path);

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&json_path).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(pass.error(format!(
                "whisper-cli exited with {} for {}: {}",
                output.status,
                audio_path.display(),
                stderr.trim()
            )));
        }

        let data = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            pass.error(format!("failed to read {}: {e}", json_path.display()))
        })?;

        if let Err(e) = tokio::fs::remove_file(&json_path).await {
            warn!("Failed to delete whisper output {:?}: {}", json_path, e);
        }

        Ok(data)
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperCli {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn detect_language(&self, audio_path: &Path) -> Result<String> {
        debug!("Detecting spoken language");
        let data = self.run(Pass::Detect, audio_path).await?;
        let language = parse_detection_output(&data)?;
        info!("Detected language: {}", language);
        Ok(language)
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        debug!("Transcribing audio file with {} threads", self.threads);
        let data = self.run(Pass::Transcribe, audio_path).await?;
        let transcript = parse_transcription_output(&data)?;
        info!("Transcribed {} segments", transcript.segments.len());
        Ok(transcript)
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_text(&self, audio_path: &Path) -> Result<String> {
        let data = self.run(Pass::Recording, audio_path).await?;
        parse_text_output(&data)
    }
}

fn sidecar_path(audio_path: &Path) -> PathBuf {
    let mut path = audio_path.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

#[derive(Deserialize)]
struct DetectionOutput {
    result: DetectionResult,
}

#[derive(Deserialize)]
struct DetectionResult {
    language: String,
}

#[derive(Deserialize)]
struct TranscriptionOutput {
    #[serde(default)]
    transcription: Vec<TranscriptionEntry>,
}

#[derive(Deserialize)]
struct TranscriptionEntry {
    text: String,
    offsets: Offsets,
}

#[derive(Deserialize)]
struct TextOutput {
    #[serde(default)]
    transcription: Vec<TextEntry>,
}

#[derive(Deserialize)]
struct TextEntry {
    text: String,
}

#[derive(Deserialize)]
struct Offsets {
    from: f64,
    to: f64,
}

/// Extract the language code from a detect-only result.
pub fn parse_detection_output(data: &str) -> Result<String> {
    let parsed: DetectionOutput = serde_json::from_str(data)
        .map_err(|e| ShadowifyError::Detection(format!("failed to parse whisper output: {e}")))?;

    let language = parsed.result.language.trim().to_lowercase();
    if language.is_empty() {
        return Err(ShadowifyError::Detection("whisper reported no language".to_string()));
    }
    Ok(language)
}

/// Map a full-transcription result to segments, keeping engine order.
pub fn parse_transcription_output(data: &str) -> Result<Transcript> {
    let parsed: TranscriptionOutput = serde_json::from_str(data).map_err(|e| {
        ShadowifyError::Transcription(format!("failed to parse whisper output: {e}"))
    })?;

    let segments = parsed
        .transcription
        .iter()
        .map(|t| TranscriptSegment::from_offsets_ms(t.offsets.from, t.offsets.to, &t.text))
        .collect();

    Ok(Transcript::new(segments))
}

/// Join the entries of a no-timestamp run into one line of text.
pub fn parse_text_output(data: &str) -> Result<String> {
    let parsed: TextOutput = serde_json::from_str(data).map_err(|e| {
        ShadowifyError::Transcription(format!("failed to parse whisper output: {e}"))
    })?;

    Ok(parsed
        .transcription
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}
