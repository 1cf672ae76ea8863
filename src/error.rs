//! Error types for Shadowify.

use thiserror::Error;

/// Library-level error type for Shadowify operations.
///
/// Pipeline failures carry the underlying cause as text so callers can report
/// it without holding on to process handles or HTTP responses.
#[derive(Error, Debug)]
pub enum ShadowifyError {
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Video already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported language '{detected}' (only '{supported}' is supported)")]
    UnsupportedLanguage { detected: String, supported: String },

    #[error("Media fetch failed: {0}")]
    Fetch(String),

    #[error("Language detection failed: {0}")]
    Detection(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Difficulty classification failed: {0}")]
    Classification(String),

    #[error("Failed to persist video: {0}")]
    Persist(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ingestion timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ShadowifyError {
    /// Stable machine-readable code reported to API callers.
    ///
    /// Every pipeline failure other than a malformed reference folds into
    /// `video.create.error`; [`cause`](Self::cause) tells them apart.
    pub fn code(&self) -> &'static str {
        match self {
            ShadowifyError::InvalidReference(_) | ShadowifyError::InvalidAudio(_) => "bad_request",
            ShadowifyError::AlreadyExists(_)
            | ShadowifyError::UnsupportedLanguage { .. }
            | ShadowifyError::Fetch(_)
            | ShadowifyError::Detection(_)
            | ShadowifyError::Transcription(_)
            | ShadowifyError::Classification(_)
            | ShadowifyError::Persist(_)
            | ShadowifyError::Timeout(_)
            | ShadowifyError::ToolNotFound(_) => "video.create.error",
            ShadowifyError::NotFound(_) => "not_found",
            _ => "internal_error",
        }
    }

    /// Snake-case name of the specific failure.
    pub fn cause(&self) -> &'static str {
        match self {
            ShadowifyError::InvalidReference(_) => "invalid_reference",
            ShadowifyError::InvalidAudio(_) => "invalid_audio",
            ShadowifyError::AlreadyExists(_) => "already_exists",
            ShadowifyError::UnsupportedLanguage { .. } => "unsupported_language",
            ShadowifyError::Fetch(_) => "fetch",
            ShadowifyError::Detection(_) => "detection",
            ShadowifyError::Transcription(_) => "transcription",
            ShadowifyError::Classification(_) => "classification",
            ShadowifyError::Persist(_) => "persist",
            ShadowifyError::NotFound(_) => "not_found",
            ShadowifyError::Timeout(_) => "timeout",
            ShadowifyError::Config(_) => "config",
            ShadowifyError::ToolNotFound(_) => "tool_not_found",
            _ => "internal",
        }
    }

    /// Whether a caller could reasonably try the same request again later.
    ///
    /// Caller errors and business rejections never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShadowifyError::Fetch(_)
                | ShadowifyError::Detection(_)
                | ShadowifyError::Transcription(_)
                | ShadowifyError::Classification(_)
                | ShadowifyError::Persist(_)
                | ShadowifyError::Timeout(_)
                | ShadowifyError::Http(_)
        )
    }
}

/// Result type alias for Shadowify operations.
pub type Result<T> = std::result::Result<T, ShadowifyError>;
