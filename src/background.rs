//! Tracked fire-and-forget jobs.
//!
//! Work that must not delay a response (such as counting a view) is spawned
//! here instead of on a bare `tokio::spawn`, so it can be drained on shutdown
//! and awaited in tests.

use std::fmt::Display;
use std::future::Future;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Tracker for detached background jobs.
#[derive(Clone, Default)]
pub struct BackgroundJobs {
    tracker: TaskTracker,
}

impl BackgroundJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a job. Its error, if any, is logged with `name` and otherwise dropped.
    pub fn submit<F, E>(&self, name: &'static str, job: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.tracker.spawn(async move {
            match job.await {
                Ok(()) => debug!("Background job '{}' finished", name),
                Err(e) => warn!("Background job '{}' failed: {}", name, e),
            }
        });
    }

    /// Number of jobs still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every job submitted so far. New jobs are still accepted afterwards.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Close the tracker and wait for outstanding jobs.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            debug!("Waiting for {} background jobs", pending);
        }
        self.tracker.wait().await;
    }
}
