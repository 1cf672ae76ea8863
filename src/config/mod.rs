//! Configuration module for Shadowify.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    ClassifierSettings, DownloaderSettings, GeneralSettings, LanguageSettings, PipelineSettings,
    ServerSettings, Settings, StoreSettings, WhisperSettings,
};
