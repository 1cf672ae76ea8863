//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and model files are available before
//! starting an ingestion that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, ShadowifyError};
use std::path::Path;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion needs the downloader, the speech engine and its models.
    Ingest,
    /// Recordings only need the speech engine and the recording model.
    Recording,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_tool(&settings.downloader.binary, "--version")?;
            check_binary(&settings.whisper.binary)?;
            check_model(&settings.whisper.detect_model)?;
            check_model(&settings.whisper.transcribe_model)?;
        }
        Operation::Recording => {
            check_binary(&settings.whisper.binary)?;
            check_model(&settings.whisper.recording_model)?;
        }
    }
    Ok(())
}

/// Check that an external tool runs.
pub fn check_tool(name: &str, version_arg: &str) -> Result<()> {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ShadowifyError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ShadowifyError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ShadowifyError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

/// whisper-cli has no version flag, so only check that it can be started.
pub fn check_binary(name: &str) -> Result<()> {
    match Command::new(Settings::expand_path(name)).arg("--help").output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ShadowifyError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ShadowifyError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

/// Check that a model file exists.
pub fn check_model(path: &str) -> Result<()> {
    let expanded = Settings::expand_path(path);
    if Path::new(&expanded).is_file() {
        Ok(())
    } else {
        Err(ShadowifyError::Config(format!(
            "whisper model not found at {}",
            expanded.display()
        )))
    }
}
