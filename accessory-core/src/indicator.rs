//! Status LED patterns.
//!
//! | mode          | cadence | pattern                         |
//! |---------------|---------|---------------------------------|
//! | Off           | -       | intensity 0                     |
//! | Commissioning | 200 ms  | full on/off blink               |
//! | Connecting    | 1000 ms | full on/off blink               |
//! | Ready         | 20 ms   | triangle-wave breathing, step 5 |
//!
//! A cadence is the minimum time between two visual updates; faster calls are
//! no-ops. Animation state survives mode changes.

use core::time::Duration;

use crate::accessory::Phase;
use crate::hal::{HardwareIo, IoError, PinId};
use crate::time::{MonotonicInstant, interval_elapsed};

pub const COMMISSIONING_BLINK: Duration = Duration::from_millis(200);
pub const CONNECTING_BLINK: Duration = Duration::from_millis(1_000);
pub const BREATHING_STEP_INTERVAL: Duration = Duration::from_millis(20);
pub const BREATHING_STEP: u8 = 5;
pub const DEFAULT_LED_PIN: PinId = PinId(1);

const FULL: i16 = 255;

/// Pattern selector for the status LED.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndicatorMode {
    Off,
    Commissioning,
    Connecting,
    Ready,
}

impl From<Phase> for IndicatorMode {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Commissioning => IndicatorMode::Commissioning,
            Phase::Connecting => IndicatorMode::Connecting,
            Phase::Ready => IndicatorMode::Ready,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorConfig {
    pub pin: PinId,
    pub commissioning_blink: Duration,
    pub connecting_blink: Duration,
    pub breathing_interval: Duration,
    pub breathing_step: u8,
}

impl IndicatorConfig {
    #[must_use]
    pub const fn new(pin: PinId) -> Self {
        Self {
            pin,
            commissioning_blink: COMMISSIONING_BLINK,
            connecting_blink: CONNECTING_BLINK,
            breathing_interval: BREATHING_STEP_INTERVAL,
            breathing_step: BREATHING_STEP,
        }
    }

    #[must_use]
    pub const fn with_breathing_step(mut self, step: u8) -> Self {
        self.breathing_step = step;
        self
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LED_PIN)
    }
}

/// Status LED renderer with its animation state.
#[derive(Clone, Debug)]
pub struct StatusIndicator<I: MonotonicInstant> {
    config: IndicatorConfig,
    last_update: Option<I>,
    brightness: i16,
    fade_direction: i16,
    on: bool,
    intensity: u8,
}

impl<I: MonotonicInstant> StatusIndicator<I> {
    #[must_use]
    pub const fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            last_update: None,
            brightness: 0,
            fade_direction: 1,
            on: false,
            intensity: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Intensity most recently rendered.
    #[must_use]
    pub const fn intensity(&self) -> u8 {
        self.intensity
    }

    /// Current breathing level.
    #[must_use]
    pub fn brightness(&self) -> u8 {
        u8::try_from(self.brightness).unwrap_or(u8::MAX)
    }

    /// Returns `true` while breathing brightness is rising.
    #[must_use]
    pub const fn is_fading_in(&self) -> bool {
        self.fade_direction > 0
    }

    /// Renders `mode` at `now`, returning a new intensity when one is due.
    pub fn update(&mut self, mode: IndicatorMode, now: I) -> Option<u8> {
        let cadence = match mode {
            IndicatorMode::Off => {
                self.intensity = 0;
                return Some(0);
            }
            IndicatorMode::Commissioning => self.config.commissioning_blink,
            IndicatorMode::Connecting => self.config.connecting_blink,
            IndicatorMode::Ready => self.config.breathing_interval,
        };

        if !interval_elapsed(self.last_update, now, cadence) {
            return None;
        }
        self.last_update = Some(now);

        self.intensity = match mode {
            IndicatorMode::Ready => self.breathe(),
            _ => {
                self.on = !self.on;
                if self.on { u8::MAX } else { 0 }
            }
        };
        Some(self.intensity)
    }

    /// Renders `mode` and drives the LED output when a new intensity is due.
    pub fn advance<H>(&mut self, io: &mut H, mode: IndicatorMode) -> Result<Option<u8>, IoError>
    where
        H: HardwareIo<Instant = I>,
    {
        let now = io.now();
        match self.update(mode, now) {
            Some(intensity) => {
                io.analog_write(self.config.pin, intensity)?;
                Ok(Some(intensity))
            }
            None => Ok(None),
        }
    }

    fn breathe(&mut self) -> u8 {
        self.brightness += self.fade_direction * i16::from(self.config.breathing_step);
        if self.brightness <= 0 || self.brightness >= FULL {
            self.fade_direction = -self.fade_direction;
        }
        self.brightness = self.brightness.clamp(0, FULL);
        self.brightness()
    }
}
