//! Shadowify CLI entry point.

use anyhow::Result;
use clap::Parser;
use shadowify::cli::{commands, Cli, Commands};
use shadowify::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("shadowify={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, config_path).await?;
        }

        Commands::Ingest { reference } => {
            commands::run_ingest(&reference, settings).await?;
        }

        Commands::Transcribe { file, evaluate } => {
            commands::run_transcribe(&file, evaluate, settings).await?;
        }

        Commands::Show { video_id } => {
            commands::run_show(&video_id, settings).await?;
        }

        Commands::List {
            query,
            category,
            popular,
            page,
            page_size,
        } => {
            commands::run_list(query, category, popular, page, page_size, settings).await?;
        }

        Commands::Segments { video_id } => {
            commands::run_segments(&video_id, settings).await?;
        }

        Commands::Categories => {
            commands::run_categories(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
