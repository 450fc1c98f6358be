//! Bounded polling schedule for transcription jobs.

use std::time::Duration;

/// How often, and for how long, a transcription job is polled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first status check.
    pub initial_interval: Duration,
    /// Upper bound for any single delay.
    pub max_interval: Duration,
    /// Delay growth factor between checks (1.0 keeps the interval fixed).
    pub multiplier: f64,
    /// Total time the caller is willing to wait for a terminal status.
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(8000),
            multiplier: 1.5,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    /// A policy that polls at a constant interval.
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
            max_wait,
        }
    }

    /// Delay to wait before poll number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_interval.min(self.max_interval);
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let delay_ms =
            self.initial_interval.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = delay_ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
