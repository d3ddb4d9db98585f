//! Monotonic time abstractions shared by firmware and host targets.
//!
//! The accessory never reads a clock directly. Each [`HardwareIo`] implementation
//! supplies its own instant type (Embassy's `Instant` on the MCU, a simulated
//! millisecond counter in the emulator) and the core only relies on the elapsed
//! time between two readings.
//!
//! [`HardwareIo`]: crate::hal::HardwareIo

use core::ops::Add;
use core::time::Duration;

/// Trait implemented by monotonic instant wrappers used for timing decisions.
pub trait MonotonicInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Millisecond timestamp used by host simulations and tests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from a raw millisecond count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw millisecond count.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl MonotonicInstant for Millis {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

/// Returns `true` when at least `interval` has passed since `last`.
///
/// A missing `last` timestamp is always due.
pub fn interval_elapsed<I: MonotonicInstant>(last: Option<I>, now: I, interval: Duration) -> bool {
    match last {
        Some(previous) => now.saturating_duration_since(previous) >= interval,
        None => true,
    }
}
