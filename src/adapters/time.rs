//! Host time adapter.
//!
//! Implements [`Clock`] on top of `std::time::Instant`, measured from the
//! moment the adapter was created (normally host startup).

use std::time::Instant;

use crate::app::ports::Clock;
use crate::time::Timestamp;

/// Monotonic clock for the host process.
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
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.start.elapsed())
    }
}
