//! Capped exponential backoff for fetch retries.

use std::time::Duration;

const GROWTH: f64 = 1.5;

/// Retry counter plus the curve that turns it into a delay.
///
/// `delay = min(base * 1.5^retry_count, cap)`. No jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    retry_count: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            retry_count: 0,
        }
    }

    /// Delay for the current retry count, without consuming it.
    pub fn delay(&self) -> Duration {
        let factor = GROWTH.powi(self.retry_count.min(64) as i32);
        let millis = (self.base.as_millis() as f64 * factor).min(self.cap.as_millis() as f64);
        Duration::from_millis(millis.round() as u64)
    }

    /// Delay for this attempt; bumps the counter for the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay();
        self.retry_count = self.retry_count.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.retry_count = 0;
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30))
    }
}
