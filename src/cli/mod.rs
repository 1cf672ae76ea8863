//! CLI module for Shadowify.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shadowify - YouTube ingestion for language learners
///
/// Downloads a video's audio, checks the spoken language, transcribes it into
/// timed segments and grades each segment's difficulty.
#[derive(Parser, Debug)]
#[command(name = "shadowify")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SHADOWIFY_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check external tools, models and configuration
    Doctor,

    /// Ingest a YouTube video (URL or bare id)
    Ingest {
        /// YouTube URL, youtu.be link or video id
        reference: String,
    },

    /// Transcribe a recording of your own speech (WAV)
    Transcribe {
        /// Audio file to transcribe
        file: PathBuf,

        /// Also grade the text's CEFR level
        #[arg(short, long)]
        evaluate: bool,
    },

    /// Show a stored video (counts as a view)
    Show {
        /// Video id
        video_id: String,
    },

    /// List stored videos
    List {
        /// Search title, full title and description
        #[arg(short, long)]
        query: Option<String>,

        /// Only videos in this category
        #[arg(long)]
        category: Option<String>,

        /// Order by view count instead of newest first
        #[arg(long)]
        popular: bool,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Videos per page (1-100)
        #[arg(long, default_value = "10")]
        page_size: u32,
    },

    /// Print the segments of a stored video
    Segments {
        /// Video id
        video_id: String,
    },

    /// List the categories of stored videos
    Categories,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
