//! Embassy time source for the accessory core.

use accessory_core::time::MonotonicInstant;
use embassy_time::Instant;

/// Embassy `Instant` adapted to the core's monotonic clock trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Samples the embassy time driver.
    #[cfg(target_os = "none")]
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}

/// Converts a core duration for embassy timers, saturating on overflow.
#[must_use]
pub fn embassy_duration(duration: core::time::Duration) -> embassy_time::Duration {
    embassy_time::Duration::try_from(duration).unwrap_or(embassy_time::Duration::MAX)
}
