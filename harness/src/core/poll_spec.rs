//! Bounded-wait arithmetic for the condition poller.

use std::time::Duration;

use anyhow::{Result, anyhow};

/// Upper bound on the wait before the first check of a poll.
pub const MAX_WARMUP: Duration = Duration::from_secs(5);

/// Shape of one bounded poll: how often to check, for how long, and whether to
/// reload the page between failed checks.
///
/// Constructed and consumed per call; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub max_wait: Duration,
    /// Force a full page reload after every failed check.
    pub refresh_on_stall: bool,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self::from_secs(10, 180)
    }
}

impl PollSpec {
    /// Build a spec from whole seconds, without a refresh between checks.
    pub const fn from_secs(interval_secs: u64, max_wait_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_wait: Duration::from_secs(max_wait_secs),
            refresh_on_stall: false,
        }
    }

    /// Reload the page between failed checks.
    pub const fn with_refresh(mut self) -> Self {
        self.refresh_on_stall = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("poll interval must be > 0"));
        }
        if self.max_wait < self.interval {
            return Err(anyhow!(
                "poll max_wait ({:?}) must be >= interval ({:?})",
                self.max_wait,
                self.interval
            ));
        }
        Ok(())
    }

    /// Number of checks after the warm-up: `floor(max_wait / interval)`.
    pub fn attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        let attempts = self.max_wait.as_millis() / self.interval.as_millis();
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }

    /// Wait before the first check: `min(interval, 5s)`.
    pub fn warmup(&self) -> Duration {
        self.interval.min(MAX_WARMUP)
    }
}
