//! Bounded retry policy for transient upstream failures.

use std::time::Duration;

/// Retry budget applied per window: a bound on consecutive failures with an
/// optional exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before the window is abandoned.
    pub max_attempts: u32,
    /// Delay before the first retry; zero disables backoff.
    pub initial_backoff: Duration,
    /// Multiplier applied per additional consecutive failure.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // the upstream applies its own rate limiting; backoff stays opt-in
        Self {
            max_attempts: 5,
            initial_backoff: Duration::ZERO,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following consecutive failure number `failures`
    /// (1-based). `None` once the budget is spent.
    pub fn delay(&self, failures: u32) -> Option<Duration> {
        if failures >= self.max_attempts {
            return None;
        }
        if self.initial_backoff.is_zero() {
            return Some(Duration::ZERO);
        }
        let factor = self.backoff_multiplier.powi(failures.saturating_sub(1) as i32);
        Some(self.initial_backoff.mul_f64(factor).min(self.max_backoff))
    }
}
