//! CLI output formatting utilities.

use crate::store::{Segment, Video};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// One line per video in a listing.
    pub fn video_line(video: &Video) {
        println!(
            "  {} {} ({}, {}, {} views, {})",
            style("*").cyan(),
            style(&video.title).bold(),
            style(&video.id).dim(),
            video.duration_string,
            video.view_count,
            video.difficulty.as_deref().unwrap_or("-")
        );
    }

    /// Full details of one video.
    pub fn video_details(video: &Video) {
        Output::header(&video.title);
        Output::kv("Id", &video.id);
        Output::kv("YouTube id", &video.youtube_id);
        if !video.full_title.is_empty() && video.full_title != video.title {
            Output::kv("Full title", &video.full_title);
        }
        Output::kv("Duration", &video.duration_string);
        Output::kv("Difficulty", video.difficulty.as_deref().unwrap_or("-"));
        Output::kv("Views", &video.view_count.to_string());
        if !video.categories.is_empty() {
            Output::kv("Categories", &video.categories.join(", "));
        }
        if !video.tags.is_empty() {
            Output::kv("Tags", &video.tags.join(", "));
        }
        if !video.thumbnail.is_empty() {
            Output::kv("Thumbnail", &video.thumbnail);
        }
        Output::kv("Created", &video.created_at.format("%Y-%m-%d %H:%M").to_string());
        if !video.description.is_empty() {
            println!("\n   {}", content_preview(&video.description, 300));
        }
    }

    /// One transcript segment with its time range and label.
    pub fn segment_line(segment: &Segment) {
        println!(
            "  {} {} {}",
            style(format!(
                "[{:>7.2} - {:>7.2}]",
                segment.start_sec, segment.end_sec
            ))
            .cyan(),
            style(format!("{:<2}", segment.difficulty.as_deref().unwrap_or("?"))).yellow(),
            segment.content
        );
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
