//! Exponential backoff with jitter for retry waits

use rand::Rng;
use std::time::Duration;

/// Doubling backoff, capped, with a random jitter fraction added so that
/// concurrent branches retrying against one domain do not synchronize.
pub struct ExponentialBackoff {
    base_ms: u64,
    cap_ms: u64,
    jitter_percent: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self {
            base_ms,
            cap_ms,
            jitter_percent: 20,
        }
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self.base_ms.saturating_mul(2u64.saturating_pow(attempt.min(16)));
        let capped = doubled.min(self.cap_ms);

        let jitter = if self.jitter_percent > 0 {
            let bound = capped * self.jitter_percent / 100 + 1;
            rand::thread_rng().gen_range(0..bound)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}
