//! Momentary push-button debouncing.
//!
//! The debouncer is sampled once per tick. A press is reported on the first
//! active sample so the toggle feels immediate; the release is only reported
//! after the input has stayed inactive for the debounce window, and carries
//! the total hold time so long presses can be told apart from taps.

use core::time::Duration;

use crate::hal::{HardwareIo, Level, PinId};
use crate::time::MonotonicInstant;

/// Continuous inactivity required before a press is considered released.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Hold time that must be strictly exceeded for a long press.
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(10_000);

/// Default button input (boot button).
pub const DEFAULT_BUTTON_PIN: PinId = PinId(0);

/// Button wiring and timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ButtonConfig {
    pub pin: PinId,
    /// Input level that means "pressed".
    pub active_level: Level,
    pub debounce: Duration,
    pub long_press: Duration,
}

impl ButtonConfig {
    #[must_use]
    pub const fn new(pin: PinId) -> Self {
        Self {
            pin,
            active_level: Level::Low,
            debounce: DEFAULT_DEBOUNCE,
            long_press: DEFAULT_LONG_PRESS,
        }
    }

    #[must_use]
    pub const fn with_active_level(mut self, level: Level) -> Self {
        self.active_level = level;
        self
    }

    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub const fn with_long_press(mut self, long_press: Duration) -> Self {
        self.long_press = long_press;
        self
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUTTON_PIN)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonState {
    Idle,
    Pressed,
}

/// Discrete button events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonEvent {
    Pressed,
    ShortRelease(Duration),
    /// Held longer than the long-press threshold (factory-reset intent).
    LongRelease(Duration),
}

/// Idle/Pressed debouncer for one input line.
#[derive(Clone, Debug)]
pub struct ButtonDebouncer<I: MonotonicInstant> {
    config: ButtonConfig,
    state: ButtonState,
    press_started_at: Option<I>,
    inactive_since: Option<I>,
}

impl<I: MonotonicInstant> ButtonDebouncer<I> {
    #[must_use]
    pub const fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            state: ButtonState::Idle,
            press_started_at: None,
            inactive_since: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ButtonConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> ButtonState {
        self.state
    }

    /// Reads the input line and advances the debouncer.
    pub fn poll<H>(&mut self, io: &mut H) -> Option<ButtonEvent>
    where
        H: HardwareIo<Instant = I>,
    {
        let active = io.digital_read(self.config.pin) == self.config.active_level;
        let now = io.now();
        self.sample(active, now)
    }

    /// Feeds one sample of the input line.
    pub fn sample(&mut self, active: bool, now: I) -> Option<ButtonEvent> {
        match self.state {
            ButtonState::Idle => {
                if !active {
                    return None;
                }
                self.state = ButtonState::Pressed;
                self.press_started_at = Some(now);
                self.inactive_since = None;
                Some(ButtonEvent::Pressed)
            }
            ButtonState::Pressed => {
                if active {
                    // Contact bounce: restart the inactivity window.
                    self.inactive_since = None;
                    return None;
                }

                let inactive_since = *self.inactive_since.get_or_insert(now);
                if now.saturating_duration_since(inactive_since) < self.config.debounce {
                    return None;
                }

                let held = self
                    .press_started_at
                    .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));
                self.state = ButtonState::Idle;
                self.press_started_at = None;
                self.inactive_since = None;

                if held > self.config.long_press {
                    Some(ButtonEvent::LongRelease(held))
                } else {
                    Some(ButtonEvent::ShortRelease(held))
                }
            }
        }
    }
}
