//! Retrieval window planning: fixed 24-hour tiles walked backward in time.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Days between "now" and the newest window edge; results settle within
/// this lag and older windows are stable.
pub const SETTLEMENT_LAG_DAYS: i64 = 2;
/// Width of one retrieval window in hours.
pub const WINDOW_HOURS: i64 = 24;

/// One half-open retrieval window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalWindow {
    /// Inclusive lower bound.
    pub from: DateTime<Utc>,
    /// Exclusive upper bound.
    pub to: DateTime<Utc>,
}

/// Plans `days + 1` contiguous, non-overlapping windows ending at midnight
/// [`SETTLEMENT_LAG_DAYS`] before `now`, newest first.
pub fn plan_windows(now: DateTime<Utc>, days: u32) -> Vec<RetrievalWindow> {
    let newest_edge = (now - Duration::days(SETTLEMENT_LAG_DAYS))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    (0..=i64::from(days))
        .map(|i| {
            let to = newest_edge - Duration::hours(WINDOW_HOURS * i);
            RetrievalWindow {
                from: to - Duration::hours(WINDOW_HOURS),
                to,
            }
        })
        .collect()
}
