//! Display fetch state: current snapshot, last error, retry backoff.
//!
//! The player loop performs the request; this type only decides what a
//! result means and whether a retry timer should be armed.

use crate::backoff::Backoff;
use crate::error::{PlayerError, RetryPolicy};
use crate::model::Display;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct FetchState {
    device_key: String,
    snapshot: Option<Arc<Display>>,
    error: Option<PlayerError>,
    loading: bool,
    backoff: Backoff,
}

impl FetchState {
    pub fn new(device_key: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            device_key: device_key.into(),
            snapshot: None,
            error: None,
            loading: true,
            backoff,
        }
    }

    /// Fold a fetch result into the state.
    ///
    /// Returns the delay for the retry timer when the failure calls for one.
    pub fn apply(&mut self, result: Result<Display, PlayerError>) -> Option<Duration> {
        self.loading = false;
        match result {
            Ok(snapshot) => {
                if self.error.take().is_some() {
                    tracing::info!("Display fetch recovered after {} retries", self.backoff.retry_count());
                }
                let (name, count) = (&snapshot.name, snapshot.items().len());
                tracing::debug!("Display '{}' fetched with {} items", name, count);
                self.backoff.reset();
                self.snapshot = Some(Arc::new(snapshot));
                None
            }
            Err(err) => {
                let retry = match err.retry_policy() {
                    RetryPolicy::Backoff => Some(self.backoff.next_delay()),
                    RetryPolicy::None => None,
                };

                if self.snapshot.is_some() {
                    tracing::warn!("Display fetch failed, keeping last content: {}", err);
                } else {
                    tracing::error!("Display fetch failed: {}", err);
                }
                if let Some(delay) = retry {
                    tracing::info!(
                        "Retrying in {} ms (attempt {})",
                        delay.as_millis(),
                        self.backoff.retry_count()
                    );
                }

                self.error = Some(err);
                retry
            }
        }
    }

    /// True when there is nothing to show but an error.
    pub fn in_error(&self) -> bool {
        self.error.is_some() && self.snapshot.is_none()
    }

    /// Whether the periodic poll should issue a fetch.
    ///
    /// Skipped only while a network failure is waiting on its backoff retry,
    /// so the poll never races the retry. Not-found, server and malformed
    /// errors are re-polled at the normal cadence.
    pub fn should_poll(&self, retry_armed: bool) -> bool {
        !retry_armed && !matches!(self.error, Some(PlayerError::Unreachable(_)))
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    pub fn snapshot(&self) -> Option<&Arc<Display>> {
        self.snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&PlayerError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn retry_count(&self) -> u32 {
        self.backoff.retry_count()
    }
}
