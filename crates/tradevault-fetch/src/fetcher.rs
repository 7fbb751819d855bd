//! The paged retrieval loop: windows walked backward, raw pages appended to
//! one output file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult};
use crate::retry::RetryPolicy;
use crate::source::PagedSource;
use crate::window::{plan_windows, RetrievalWindow};

/// Default records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Settings for one retrieval run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Trailing days to cover; yields `days + 1` windows.
    pub days: u32,
    /// Records requested per page.
    pub page_size: u32,
    /// Append-only output file accumulating raw page payloads.
    pub output: PathBuf,
    /// Per-window retry budget.
    pub retry: RetryPolicy,
}

/// Counters for a whole retrieval run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    /// Windows fully paged.
    pub windows_completed: u64,
    /// Windows abandoned after the retry budget was spent.
    pub windows_abandoned: u64,
    /// Pages appended to the output file.
    pub pages: u64,
    /// Records across all appended pages.
    pub records: u64,
}

enum WindowEnd {
    Completed,
    Abandoned,
}

/// Walks retrieval windows backward, paging each one into the output file.
pub struct PagedFetcher<S> {
    source: S,
    config: FetchConfig,
}

impl<S: PagedSource> PagedFetcher<S> {
    /// Builds a fetcher over a paged source.
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Runs the retrieval loop from the current time.
    pub async fn run(&self) -> FetchResult<FetchStats> {
        self.run_from(Utc::now()).await
    }

    /// Runs the retrieval loop with an explicit clock. Windows are paged
    /// newest first; an abandoned window never fails the run.
    pub async fn run_from(&self, now: DateTime<Utc>) -> FetchResult<FetchStats> {
        let windows = plan_windows(now, self.config.days);
        let mut output = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.config.output)
            .await?;

        let mut stats = FetchStats::default();
        for window in &windows {
            match self.drain_window(window, &mut output, &mut stats).await? {
                WindowEnd::Completed => stats.windows_completed += 1,
                WindowEnd::Abandoned => stats.windows_abandoned += 1,
            }
        }
        output.flush().await?;
        info!(
            windows_completed = stats.windows_completed,
            windows_abandoned = stats.windows_abandoned,
            pages = stats.pages,
            records = stats.records,
            "retrieval run complete"
        );
        Ok(stats)
    }

    async fn drain_window(
        &self,
        window: &RetrievalWindow,
        output: &mut File,
        stats: &mut FetchStats,
    ) -> FetchResult<WindowEnd> {
        debug!(from = %window.from, to = %window.to, "paging window");
        let mut offset = 0u64;
        let mut failures = 0u32;
        loop {
            match self
                .source
                .fetch(window, offset, self.config.page_size)
                .await
            {
                Ok(page) => {
                    failures = 0;
                    output.write_all(&page.payload).await?;
                    offset += u64::from(page.records);
                    stats.pages += 1;
                    stats.records += u64::from(page.records);
                    if !page.more_available {
                        return Ok(WindowEnd::Completed);
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    failures += 1;
                    match self.config.retry.delay(failures) {
                        Some(delay) => {
                            warn!(error = %err, failures, offset, "upstream call failed, retrying");
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        None => {
                            warn!(
                                error = %err,
                                failures,
                                from = %window.from,
                                "retry budget spent, abandoning window"
                            );
                            return Ok(WindowEnd::Abandoned);
                        }
                    }
                }
            }
        }
    }
}
