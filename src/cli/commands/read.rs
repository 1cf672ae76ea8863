//! Read-only catalogue commands: show, list, segments, categories.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::{Pagination, VideoFilter, VideoSort};
use anyhow::Result;

/// Run the show command.
pub async fn run_show(video_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;

    let video = orchestrator.get_video(video_id).await?;
    Output::video_details(&video);

    // The view increment must finish before the process exits.
    orchestrator.jobs().shutdown().await;
    Ok(())
}

/// Run the list command.
pub async fn run_list(
    query: Option<String>,
    category: Option<String>,
    popular: bool,
    page: u32,
    page_size: u32,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;

    let filter = VideoFilter {
        q: query,
        category,
        sort: if popular { VideoSort::Popular } else { VideoSort::Latest },
    };
    let pagination = Pagination::new(page, page_size);

    let result = orchestrator.list_videos(&filter, pagination).await?;

    if result.total == 0 {
        Output::info("No videos found. Use 'shadowify ingest <reference>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Videos ({})", result.total));
    println!();
    for video in &result.items {
        Output::video_line(video);
    }
    println!();
    Output::kv(
        "Page",
        &format!(
            "{} of {}",
            pagination.page,
            pagination.total_pages(result.total).max(1)
        ),
    );

    Ok(())
}

/// Run the segments command.
pub async fn run_segments(video_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;

    let segments = orchestrator.segments(video_id).await?;
    if segments.is_empty() {
        Output::info("This video has no segments.");
        return Ok(());
    }

    Output::header(&format!("Segments ({})", segments.len()));
    println!();
    for segment in &segments {
        Output::segment_line(segment);
    }

    Ok(())
}

/// Run the categories command.
pub async fn run_categories(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;

    let categories = orchestrator.categories().await?;
    if categories.is_empty() {
        Output::info("No categories yet.");
        return Ok(());
    }

    Output::header("Categories");
    for category in &categories {
        Output::list_item(category);
    }

    Ok(())
}
