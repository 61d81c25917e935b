// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Durable timers are recorded as wall-clock deadlines, so the clock
//! exposes both a monotonic instant (for in-process scheduling) and
//! microseconds since the Unix epoch (for deadlines that must survive
//! restart).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Microseconds since the Unix epoch
    fn epoch_micros(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
///
/// The instant and epoch views advance together so scheduler polling and
/// durable deadlines stay consistent in tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeTime>>,
}

struct FakeTime {
    instant: Instant,
    epoch_micros: u64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTime {
                instant: Instant::now(),
                // Arbitrary non-zero base so deadlines are distinguishable
                epoch_micros: 1_700_000_000_000_000,
            })),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut time = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        time.instant += duration;
        time.epoch_micros += duration.as_micros() as u64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).instant
    }

    fn epoch_micros(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .epoch_micros
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
