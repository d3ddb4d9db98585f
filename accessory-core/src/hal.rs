//! Board-level IO surface consumed by the accessory.
//!
//! Firmware implements [`HardwareIo`] on top of the MCU GPIO/PWM drivers while
//! the emulator and tests provide in-memory implementations.

use core::fmt;

use crate::time::MonotonicInstant;

/// Board pin identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PinId(pub u8);

impl PinId {
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Digital logic level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Converts a boolean power state into a drive level (`true` == high).
    #[must_use]
    pub const fn from_power(on: bool) -> Self {
        if on { Level::High } else { Level::Low }
    }

    /// Returns `true` when the level is high.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Failure reported by the board IO layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IoError {
    /// The pin is not wired to an output on this board.
    UnknownPin(PinId),
    /// The driver rejected the write.
    WriteFailed(PinId),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::UnknownPin(pin) => write!(f, "unknown pin {pin}"),
            IoError::WriteFailed(pin) => write!(f, "write failed on {pin}"),
        }
    }
}

/// Abstraction over the physical pins and clock.
pub trait HardwareIo {
    /// Monotonic timestamp type returned by [`HardwareIo::now`].
    type Instant: MonotonicInstant;

    /// Drives a digital output.
    fn digital_write(&mut self, pin: PinId, level: Level) -> Result<(), IoError>;

    /// Samples a digital input.
    fn digital_read(&mut self, pin: PinId) -> Level;

    /// Drives an intensity-capable output (0 == off, 255 == full).
    fn analog_write(&mut self, pin: PinId, intensity: u8) -> Result<(), IoError>;

    /// Reads the monotonic clock.
    fn now(&self) -> Self::Instant;
}
