//! Subprocess-backed audio acquisition.

mod downloader;

pub use downloader::{parse_metadata_stdout, YtDlpFetcher};
