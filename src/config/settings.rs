//! Configuration settings for Shadowify.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub downloader: DownloaderSettings,
    pub whisper: WhisperSettings,
    pub language: LanguageSettings,
    pub classifier: ClassifierSettings,
    pub store: StoreSettings,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for downloaded audio while a pipeline run is in flight.
    pub temp_dir: String,
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.shadowify".to_string(),
            temp_dir: "/tmp/shadowify".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// yt-dlp invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderSettings {
    /// Downloader executable.
    pub binary: String,
    /// Audio container the downloader extracts to.
    pub audio_format: String,
    /// Extra arguments appended before the URL.
    pub extra_args: Vec<String>,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            audio_format: "wav".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// whisper.cpp command line settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperSettings {
    /// Path to the `whisper-cli` executable.
    pub binary: String,
    /// Model used for language detection (small and fast is enough).
    pub detect_model: String,
    /// Model used for the full transcription pass.
    pub transcribe_model: String,
    /// Model used for plain-text transcription of learner recordings.
    pub recording_model: String,
    /// Worker threads. 0 picks `available_parallelism - 2`.
    pub threads: usize,
    /// Word timestamp probability threshold (`-wt`).
    pub word_threshold: f32,
    /// Split segments on word boundaries (`-sow`).
    pub split_on_word: bool,
}

impl Default for WhisperSettings {
    fn default() -> Self {
        Self {
            binary: "lib/whisper-cli".to_string(),
            detect_model: "lib/ggml-tiny.bin".to_string(),
            transcribe_model: "lib/ggml-base.en.bin".to_string(),
            recording_model: "lib/ggml-tiny.bin".to_string(),
            threads: 0,
            word_threshold: 0.1,
            split_on_word: true,
        }
    }
}

impl WhisperSettings {
    /// Resolve the thread count handed to whisper-cli.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1)
    }
}

/// Spoken-language gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    /// The single language code accepted for ingestion.
    pub supported: String,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            supported: "en".to_string(),
        }
    }
}

/// Sentence-difficulty prediction endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// URL receiving `POST {"sentences": [...]}`.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Reject responses whose echoed sentences differ from the request.
    pub verify_echo: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5050/predict".to_string(),
            timeout_seconds: 60,
            verify_echo: false,
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.shadowify/shadowify.db".to_string(),
        }
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PipelineSettings {
    /// Upper bound for one ingestion run in seconds. 0 disables the limit.
    pub timeout_seconds: u64,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.language.supported.trim().is_empty() {
            return Err(crate::error::ShadowifyError::Config(
                "language.supported must not be empty".to_string(),
            ));
        }
        if url::Url::parse(&self.classifier.endpoint).is_err() {
            return Err(crate::error::ShadowifyError::Config(format!(
                "classifier.endpoint is not a valid URL: {}",
                self.classifier.endpoint
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ShadowifyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shadowify")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
