//! Owned, cancellable timer handles for the player loop.
//!
//! Each handle is polled from one `select!` branch. A disarmed handle never
//! completes, so its branch simply stays quiet. Dropping or cancelling a
//! handle guarantees its expiry is never observed.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

/// One-shot timer that can be re-armed and cancelled.
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, sleep: None }
    }

    /// Arm (or re-arm) the timer to fire once after `after`.
    pub fn arm(&mut self, after: Duration) {
        tracing::trace!("Timer {} armed for {:?}", self.name, after);
        self.sleep = Some(Box::pin(sleep(after)));
    }

    /// Disarm the timer. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed deadline passes, then disarms.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the timer armed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.sleep = None;
            }
            None => pending().await,
        }
    }
}

/// Periodic timer.
#[derive(Debug)]
pub struct Ticker {
    name: &'static str,
    interval: Option<Interval>,
}

impl Ticker {
    /// Start ticking every `period`; the first tick comes immediately when
    /// `immediate` is set, otherwise after one full period.
    pub fn start(name: &'static str, period: Duration, immediate: bool) -> Self {
        let first = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            name,
            interval: Some(interval),
        }
    }

    /// A ticker that never ticks.
    pub fn idle(name: &'static str) -> Self {
        Self {
            name,
            interval: None,
        }
    }

    pub fn stop(&mut self) -> bool {
        if self.interval.take().is_some() {
            tracing::trace!("Ticker {} stopped", self.name);
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolves on the next tick; never resolves once stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => pending().await,
        }
    }
}
