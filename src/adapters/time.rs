//! Monotonic clock adapter.
//!
//! Wraps `std::time::Instant`, anchored when the clock is created, so
//! `now_ms()` reads as milliseconds since boot.

use std::time::Instant;

use crate::app::ports::Clock;
use crate::timer::Millis;

/// Host monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}
