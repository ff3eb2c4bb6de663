//! Sliding-window error budget for broker fetch failures
//!
//! Only fetch failures (network, decode, generic non-2xx) are counted;
//! local-forward failures have their own recovery path and never reach the
//! governor. Exhausting the budget tears the session down so an unreachable
//! broker cannot keep a session retrying forever.

use std::time::{Duration, Instant};
use tunnerse_common::config::GovernorConfig;

/// Failure counter with a fixed sliding window.
#[derive(Debug)]
pub struct ErrorGovernor {
    window: Duration,
    threshold: usize,
    failures: Vec<Instant>,
}

impl ErrorGovernor {
    /// Create a governor from configuration.
    #[must_use]
    pub fn new(config: &GovernorConfig) -> Self {
        Self {
            window: config.window,
            threshold: config.threshold,
            failures: Vec::new(),
        }
    }

    /// Record one fetch failure at the current instant.
    pub fn record_failure(&mut self) {
        self.record_at(Instant::now());
    }

    fn record_at(&mut self, at: Instant) {
        self.failures.push(at);
    }

    /// Purge entries older than the window and report whether the budget is
    /// exhausted. Called once at the head of every loop iteration.
    pub fn exhausted(&mut self) -> bool {
        let now = Instant::now();
        self.failures
            .retain(|t| now.duration_since(*t) <= self.window);
        self.failures.len() >= self.threshold
    }

    /// Number of failures currently inside the window.
    #[must_use]
    pub fn recent_failures(&self) -> usize {
        self.failures.len()
    }
}
