// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Resource manager tunables.

use std::time::Duration;

/// Tunables of a resource manager.
///
/// Only continuity adoption has tunables at the moment.  They bound how long the auto-refresh
/// quiesce may busy-wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub(crate) poll_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) settle_retries: u32,
    pub(crate) settle_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // two vsyncs
            poll_timeout: Duration::from_millis(35),
            poll_interval: Duration::from_micros(500),
            settle_retries: 3,
            settle_delay: Duration::from_millis(3),
        }
    }
}

impl Config {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets how long to wait for a pingpong-done interrupt per attempt.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the interval between interrupt status reads.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.poll_interval = interval;
        }
        self
    }

    /// Sets how many times to wait for the line count to settle.
    pub fn settle_retries(mut self, retries: u32) -> Self {
        self.settle_retries = retries.max(1);
        self
    }

    /// Sets the delay between settle attempts.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Returns how many interrupt status reads one attempt makes.  It is at least one.
    pub(crate) fn poll_count(&self) -> u128 {
        (self.poll_timeout.as_micros() / self.poll_interval.as_micros().max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let cfg = Config::new();
        assert_eq!(cfg.poll_count(), 70);
        assert_eq!(cfg.settle_retries, 3);

        let cfg = Config::new()
            .poll_timeout(Duration::ZERO)
            .poll_interval(Duration::ZERO)
            .settle_retries(0);
        assert_eq!(cfg.poll_interval, Duration::from_micros(500));
        assert_eq!(cfg.poll_count(), 1);
        assert_eq!(cfg.settle_retries, 1);
    }
}
