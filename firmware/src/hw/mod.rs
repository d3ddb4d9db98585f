//! STM32G0 board wiring for the relay accessory.
//!
//! Logical pin numbers used by the accessory core map onto the board as
//! follows:
//!
//! | Pin id | Function        | MCU pin |
//! |--------|-----------------|---------|
//! | 0      | user button     | PC13    |
//! | 1      | status LED      | PA6 (TIM3 CH1) |
//! | 10     | relay 0         | PA4     |
//! | 11     | relay 1         | PA3     |
//! | 22     | relay 2         | PA2     |
//! | 23     | relay 3         | PA5     |

use accessory_core::accessory::{DEFAULT_RELAY_PINS, RELAY_COUNT};
use accessory_core::button::DEFAULT_BUTTON_PIN;
use accessory_core::hal::{HardwareIo, IoError, Level, PinId};
use accessory_core::indicator::DEFAULT_LED_PIN;
use embassy_stm32::gpio::{Input, Level as GpioLevel, Output};
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;

use crate::clock::FirmwareInstant;

/// Concrete `HardwareIo` backed by embassy-stm32 drivers.
pub struct BoardIo<'d> {
    relays: [Output<'d>; RELAY_COUNT],
    button: Input<'d>,
    led: SimplePwmChannel<'d, TIM3>,
}

impl<'d> BoardIo<'d> {
    pub fn new(
        relays: [Output<'d>; RELAY_COUNT],
        button: Input<'d>,
        mut led: SimplePwmChannel<'d, TIM3>,
    ) -> Self {
        led.enable();
        led.set_duty_cycle_fully_off();
        Self {
            relays,
            button,
            led,
        }
    }

    fn relay_mut(&mut self, pin: PinId) -> Result<&mut Output<'d>, IoError> {
        let index = DEFAULT_RELAY_PINS
            .iter()
            .position(|candidate| *candidate == pin)
            .ok_or(IoError::UnknownPin(pin))?;
        self.relays.get_mut(index).ok_or(IoError::UnknownPin(pin))
    }
}

impl HardwareIo for BoardIo<'_> {
    type Instant = FirmwareInstant;

    fn digital_write(&mut self, pin: PinId, level: Level) -> Result<(), IoError> {
        let output = self.relay_mut(pin)?;
        output.set_level(match level {
            Level::Low => GpioLevel::Low,
            Level::High => GpioLevel::High,
        });
        Ok(())
    }

    fn digital_read(&mut self, pin: PinId) -> Level {
        if pin == DEFAULT_BUTTON_PIN {
            if self.button.is_high() {
                Level::High
            } else {
                Level::Low
            }
        } else {
            // Relays read back their latched output.
            self.relay_mut(pin)
                .map_or(Level::Low, |output| {
                    if output.is_set_high() {
                        Level::High
                    } else {
                        Level::Low
                    }
                })
        }
    }

    fn analog_write(&mut self, pin: PinId, intensity: u8) -> Result<(), IoError> {
        if pin != DEFAULT_LED_PIN {
            return Err(IoError::UnknownPin(pin));
        }
        self.led
            .set_duty_cycle_fraction(u16::from(intensity), u16::from(u8::MAX));
        Ok(())
    }

    fn now(&self) -> FirmwareInstant {
        FirmwareInstant::now()
    }
}
