//! Transcribe command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use std::path::Path;

/// Transcribe a recording of the learner's own speech.
pub async fn run_transcribe(file: &Path, evaluate: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Recording, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'shadowify doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let orchestrator = Orchestrator::new(&settings)?;

    let spinner = Output::spinner(&format!("Transcribing {}...", file.display()));
    let result = orchestrator.transcribe_recording(&audio, evaluate).await;
    spinner.finish_and_clear();

    let transcript = result?;
    if transcript.text.is_empty() {
        Output::warning("No speech recognised.");
    } else {
        println!("{}", transcript.text);
    }
    if let Some(level) = &transcript.cefr {
        Output::kv("CEFR", level);
    }
    Ok(())
}
