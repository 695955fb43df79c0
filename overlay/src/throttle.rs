//! Rate limiting for repetitive log lines.

use std::time::{Duration, Instant};

/// Lets an event through at most once per `interval`, counting the ones
/// it swallowed in between.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// `Some(n)` if the event may be reported now, where `n` is how many
    /// were suppressed since the last report; `None` otherwise.
    pub fn check(&mut self, now: Instant) -> Option<u64> {
        let due = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if !due {
            self.suppressed += 1;
            return None;
        }
        self.last = Some(now);
        Some(std::mem::take(&mut self.suppressed))
    }
}
