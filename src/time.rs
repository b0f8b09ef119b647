//! Monotonic timestamps used for confirmation-delay arithmetic.

use core::time::Duration;

/// A point on the host's monotonic clock, measured from an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub const fn from_duration(d: Duration) -> Self {
        Self(d)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Seconds elapsed since `earlier`.  Zero if `earlier` is in the future,
    /// which happens when overlapping evaluations complete out of order.
    pub fn secs_since(self, earlier: Self) -> f32 {
        self.0.saturating_sub(earlier.0).as_secs_f32()
    }
}
