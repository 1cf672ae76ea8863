//! CLI command implementations.

mod config;
mod doctor;
mod ingest;
mod read;
mod serve;
mod transcribe;

pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use read::{run_categories, run_list, run_segments, run_show};
pub use serve::{router, run_serve, status_for, ApiError, AppState};
pub use transcribe::run_transcribe;
