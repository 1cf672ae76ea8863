//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::ShadowifyError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(reference: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'shadowify doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;

    let spinner = Output::spinner(&format!("Ingesting {}...", reference));
    let result = orchestrator.ingest(reference).await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            Output::success(&format!(
                "Stored '{}' ({} segments)",
                outcome.title, outcome.segment_count
            ));
            Output::kv("Video id", &outcome.video_id);
            Output::kv("YouTube id", &outcome.youtube_id);
            Output::kv("Difficulty", outcome.difficulty.as_deref().unwrap_or("-"));
            Ok(())
        }
        Err(ShadowifyError::AlreadyExists(id)) => {
            Output::warning(&format!("'{}' is already stored.", id));
            Err(ShadowifyError::AlreadyExists(id).into())
        }
        Err(e) => {
            Output::error(&format!("Failed to ingest {}: {}", reference, e));
            if e.is_retryable() {
                Output::info("This failure may be temporary; try again later.");
            }
            Err(e.into())
        }
    }
}
