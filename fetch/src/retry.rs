//! Retry schedule and cancellable waits

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Exponential backoff for rate-limited requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts failed
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Per-page retry bookkeeping
#[derive(Debug, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<FetchError>,
}

/// Pause before fetching page `pages_fetched + 1`
pub fn inter_page_delay(config: &FetchConfig, pages_fetched: usize) -> Duration {
    let factor = u32::try_from(pages_fetched).unwrap_or(u32::MAX);
    config
        .inter_page_delay()
        .checked_mul(factor)
        .unwrap_or(config.max_delay())
        .min(config.max_delay())
}

/// Sleep for `duration` unless `cancel` fires first
pub async fn cancellable_sleep(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
