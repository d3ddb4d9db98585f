//! Physical relay outputs.

use core::fmt;

use crate::hal::{HardwareIo, IoError, Level, PinId};

/// Index of a relay within the accessory (0..N-1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RelayId(pub u8);

impl RelayId {
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay{}", self.0)
    }
}

/// One relay actuator and the last power value accepted for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelayOutput {
    id: RelayId,
    pin: PinId,
    current_state: bool,
    synced: bool,
}

impl RelayOutput {
    #[must_use]
    pub const fn new(id: RelayId, pin: PinId) -> Self {
        Self {
            id,
            pin,
            current_state: false,
            synced: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> RelayId {
        self.id
    }

    #[must_use]
    pub const fn pin(&self) -> PinId {
        self.pin
    }

    /// Last accepted power value.
    #[must_use]
    pub const fn current_state(&self) -> bool {
        self.current_state
    }

    /// `false` after a failed physical write until the next successful one.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.synced
    }

    /// Configures the output and drives it low (relay off).
    pub fn init<H: HardwareIo>(&mut self, io: &mut H) -> Result<(), IoError> {
        self.current_state = false;
        self.synced = false;
        io.digital_write(self.pin, Level::Low)?;
        self.synced = true;
        Ok(())
    }

    /// Applies a power value to the actuator, returning `true` when the pin was driven.
    ///
    /// The value is recorded as the accepted state even when the physical write
    /// fails; the relay is then marked unsynced and rewritten on the next call.
    pub fn set_power<H: HardwareIo>(&mut self, io: &mut H, on: bool) -> Result<bool, IoError> {
        if self.synced && self.current_state == on {
            return Ok(false);
        }

        self.current_state = on;
        match io.digital_write(self.pin, Level::from_power(on)) {
            Ok(()) => {
                self.synced = true;
                Ok(true)
            }
            Err(error) => {
                self.synced = false;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Millis;
    use heapless::Vec;

    #[derive(Default)]
    struct MockIo {
        writes: Vec<(PinId, Level), 8>,
        fail_next: bool,
    }

    impl HardwareIo for MockIo {
        type Instant = Millis;

        fn digital_write(&mut self, pin: PinId, level: Level) -> Result<(), IoError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(IoError::WriteFailed(pin));
            }
            self.writes.push((pin, level)).unwrap();
            Ok(())
        }

        fn digital_read(&mut self, _pin: PinId) -> Level {
            Level::High
        }

        fn analog_write(&mut self, _pin: PinId, _intensity: u8) -> Result<(), IoError> {
            Ok(())
        }

        fn now(&self) -> Millis {
            Millis::ZERO
        }
    }

    #[test]
    fn init_drives_output_low() {
        let mut io = MockIo::default();
        let mut relay = RelayOutput::new(RelayId(0), PinId(10));

        relay.init(&mut io).unwrap();

        assert_eq!(io.writes.as_slice(), &[(PinId(10), Level::Low)]);
        assert!(!relay.current_state());
        assert!(relay.is_synced());
    }

    #[test]
    fn unchanged_value_skips_the_write() {
        let mut io = MockIo::default();
        let mut relay = RelayOutput::new(RelayId(1), PinId(11));
        relay.init(&mut io).unwrap();

        assert!(relay.set_power(&mut io, true).unwrap());
        assert!(!relay.set_power(&mut io, true).unwrap());

        assert_eq!(io.writes.len(), 2);
        assert!(relay.current_state());
    }

    #[test]
    fn failed_write_is_retried_on_next_set() {
        let mut io = MockIo::default();
        let mut relay = RelayOutput::new(RelayId(2), PinId(22));
        relay.init(&mut io).unwrap();

        io.fail_next = true;
        assert_eq!(
            relay.set_power(&mut io, true),
            Err(IoError::WriteFailed(PinId(22)))
        );
        assert!(relay.current_state());
        assert!(!relay.is_synced());

        assert!(relay.set_power(&mut io, true).unwrap());
        assert!(relay.is_synced());
        assert_eq!(io.writes.last(), Some(&(PinId(22), Level::High)));
    }
}
