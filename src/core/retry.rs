//! Backoff between version-race retries.
//!
//! An advance that loses a compare-and-swap re-reads the task and tries
//! again. The policy bounds how many races one caller may lose and how long
//! it waits before re-reading.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How an advance backs off after losing a version race.
///
/// Read from the `retry` section of the config file; missing keys take
/// the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Advance attempts per call, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before the first re-read, in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Ceiling on any single wait, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth of the wait per lost race
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    50
}

fn default_max_delay() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Re-read straight away after each lost race
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Wait before re-reading after `lost_races` conflicts (1 = first loss)
    pub fn backoff_after(&self, lost_races: u32) -> Duration {
        let growth = self
            .backoff_multiplier
            .powi(lost_races.saturating_sub(1).min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay_ms as f64 * growth).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }

    /// Whether a caller that has lost `lost_races` races may try again
    pub fn may_retry_after(&self, lost_races: u32) -> bool {
        lost_races < self.max_attempts
    }
}
