// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with exponential backoff
//!
//! Applies only to transient sync failures; persist failures and fatal
//! sync errors are never retried.

use std::time::Duration;

/// Retry policy for the sync step
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum total attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub base_backoff: Duration,
    /// Backoff multiplier per subsequent attempt
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after a failed attempt, or `None` when attempts
    /// are exhausted
    ///
    /// `attempt` is the 1-based number of attempts already made.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exp);
        Some(self.base_backoff.saturating_mul(factor))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
