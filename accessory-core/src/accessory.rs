//! Top-level accessory runtime.
//!
//! [`AccessoryStateMachine`] is advanced once per scheduler tick. Each tick it
//! samples the stack's commissioning and connectivity flags, derives the
//! [`Phase`], reconciles relays on entry to Ready, renders the status LED and
//! reacts to the push button. Inbound attribute writes reach the bridge
//! through [`AccessoryStateMachine::on_attribute_pre_update`] or, for queued
//! stacks, [`AccessoryStateMachine::drain_inbound`].

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::bridge::{AttributeBridge, AttributeCallbacks, BridgeCallbacks, EndpointBinding};
use crate::button::{ButtonConfig, ButtonDebouncer, ButtonEvent};
use crate::error::{AccessoryError, InitError};
use crate::hal::{HardwareIo, PinId};
use crate::indicator::{IndicatorConfig, StatusIndicator};
use crate::relay::RelayId;
use crate::stack::{
    AttributePath, AttributeValue, AttributeWrite, EndpointId, InboundQueue, ProtocolStack,
    StackEvent,
};
use crate::status::{RelaySnapshot, StatusSnapshot};
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};
use crate::time::interval_elapsed;

/// Minimum delay between two calls to [`AccessoryStateMachine::advance`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Rate limit for the "still waiting" log while not Ready.
pub const STATUS_LOG_INTERVAL: Duration = Duration::from_millis(5_000);

/// Timeout used when reopening the commissioning window.
pub const COMMISSIONING_WINDOW_TIMEOUT: Duration = Duration::from_secs(300);

/// Power value each endpoint is registered with.
pub const DEFAULT_POWER: bool = true;

/// Number of relays on the reference board.
pub const RELAY_COUNT: usize = 4;

/// Relay outputs on the reference board.
pub const DEFAULT_RELAY_PINS: [PinId; RELAY_COUNT] = [PinId(10), PinId(11), PinId(22), PinId(23)];

/// Relay driven by the push button.
pub const BUTTON_RELAY: RelayId = RelayId(0);

/// Commissioning/connectivity phase of the accessory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Commissioning,
    Connecting,
    Ready,
}

impl Phase {
    /// Derives the phase from the two stack flags.
    #[must_use]
    pub const fn derive(commissioned: bool, connected: bool) -> Self {
        match (commissioned, connected) {
            (false, _) => Phase::Commissioning,
            (true, false) => Phase::Connecting,
            (true, true) => Phase::Ready,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Commissioning => "commissioning",
            Phase::Connecting => "connecting",
            Phase::Ready => "ready",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static accessory configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessoryConfig<const N: usize> {
    pub relay_pins: [PinId; N],
    pub default_power: bool,
    pub button: ButtonConfig,
    pub indicator: IndicatorConfig,
    pub status_log_interval: Duration,
    pub commissioning_window: Duration,
}

impl<const N: usize> AccessoryConfig<N> {
    #[must_use]
    pub const fn new(relay_pins: [PinId; N]) -> Self {
        Self {
            relay_pins,
            default_power: DEFAULT_POWER,
            button: ButtonConfig::new(crate::button::DEFAULT_BUTTON_PIN),
            indicator: IndicatorConfig::new(crate::indicator::DEFAULT_LED_PIN),
            status_log_interval: STATUS_LOG_INTERVAL,
            commissioning_window: COMMISSIONING_WINDOW_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_default_power(mut self, on: bool) -> Self {
        self.default_power = on;
        self
    }

    #[must_use]
    pub const fn with_button(mut self, button: ButtonConfig) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub const fn with_indicator(mut self, indicator: IndicatorConfig) -> Self {
        self.indicator = indicator;
        self
    }

    #[must_use]
    pub const fn with_status_log_interval(mut self, interval: Duration) -> Self {
        self.status_log_interval = interval;
        self
    }
}

impl Default for AccessoryConfig<RELAY_COUNT> {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_PINS)
    }
}

/// Summary of what a single [`AccessoryStateMachine::advance`] call did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    pub phase: Phase,
    pub phase_changed: bool,
    pub defaults_applied: bool,
    /// Intensity written to the status LED, if an update was due.
    pub indicator: Option<u8>,
    pub button: Option<ButtonEvent>,
    pub factory_reset: bool,
}

/// Accessory runtime driven by the scheduler tick.
pub struct AccessoryStateMachine<S, H, const N: usize>
where
    S: ProtocolStack,
    H: HardwareIo,
{
    stack: S,
    io: H,
    bridge: AttributeBridge<N>,
    indicator: StatusIndicator<H::Instant>,
    button: ButtonDebouncer<H::Instant>,
    telemetry: TelemetryRecorder<H::Instant>,
    phase: Option<Phase>,
    ready_applied: bool,
    last_status_log: Option<H::Instant>,
    status_log_interval: Duration,
    commissioning_window: Duration,
}

impl<S, H, const N: usize> AccessoryStateMachine<S, H, N>
where
    S: ProtocolStack,
    H: HardwareIo,
{
    /// Creates the node, binds every relay to an endpoint and starts the stack.
    ///
    /// Any failure aborts startup; a partially bound accessory is never returned.
    pub fn initialize(mut stack: S, mut io: H, config: AccessoryConfig<N>) -> Result<Self, InitError> {
        stack.create_node().map_err(InitError::NodeCreation)?;
        let bridge =
            AttributeBridge::bind(&mut stack, &mut io, &config.relay_pins, config.default_power)?;
        stack.start().map_err(InitError::StackStart)?;

        Ok(Self {
            stack,
            io,
            bridge,
            indicator: StatusIndicator::new(config.indicator),
            button: ButtonDebouncer::new(config.button),
            telemetry: TelemetryRecorder::new(),
            phase: None,
            ready_applied: false,
            last_status_log: None,
            status_log_interval: config.status_log_interval,
            commissioning_window: config.commissioning_window,
        })
    }

    /// Runs one scheduler tick.
    pub fn advance(&mut self) -> TickReport {
        let now = self.io.now();
        let phase = Phase::derive(
            self.stack.is_commissioned(),
            self.stack.is_network_connected(),
        );

        let previous = self.phase.replace(phase);
        let phase_changed = previous != Some(phase);
        if phase_changed {
            self.telemetry.record(
                TelemetryEventKind::PhaseChanged {
                    from: previous,
                    to: phase,
                },
                now,
            );
        }

        let mut defaults_applied = false;
        if phase == Phase::Ready {
            if !self.ready_applied {
                self.apply_defaults();
                self.ready_applied = true;
                defaults_applied = true;
            }
        } else {
            self.ready_applied = false;
            if interval_elapsed(self.last_status_log, now, self.status_log_interval) {
                self.last_status_log = Some(now);
                let event = if phase == Phase::Commissioning {
                    TelemetryEventKind::AwaitingCommissioning
                } else {
                    TelemetryEventKind::AwaitingNetwork
                };
                self.telemetry.record(event, now);
            }
        }

        let indicator = match self.indicator.advance(&mut self.io, phase.into()) {
            Ok(intensity) => intensity,
            Err(error) => {
                self.telemetry
                    .record(TelemetryEventKind::IndicatorWriteFailed(error), now);
                None
            }
        };

        let button = self.button.poll(&mut self.io);
        let factory_reset = button.is_some_and(|event| self.handle_button(event));

        TickReport {
            phase,
            phase_changed,
            defaults_applied,
            indicator,
            button,
            factory_reset,
        }
    }

    /// Pre-update hook for the stack; see [`AttributeBridge::on_inbound_change`].
    pub fn on_attribute_pre_update(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), AccessoryError> {
        self.callbacks().on_inbound_attribute_change(path, value)
    }

    /// Identify hook for the stack.
    pub fn on_identify(
        &mut self,
        endpoint: EndpointId,
        effect: u8,
        variant: u8,
    ) -> Result<(), AccessoryError> {
        self.callbacks().on_identify(endpoint, effect, variant)
    }

    /// Borrows the bridge as the callback set registered with the stack.
    pub fn callbacks(&mut self) -> BridgeCallbacks<'_, H, N> {
        BridgeCallbacks::new(&mut self.bridge, &mut self.io, &mut self.telemetry)
    }

    /// Handles a lifecycle event published by the stack.
    pub fn on_stack_event(&mut self, event: StackEvent) {
        let now = self.io.now();
        self.telemetry.record(TelemetryEventKind::Stack(event), now);

        if event == StackEvent::FabricRemoved
            && !self.stack.is_commissioned()
            && !self.stack.is_commissioning_window_open()
        {
            let outcome = match self
                .stack
                .open_commissioning_window(self.commissioning_window)
            {
                Ok(()) => TelemetryEventKind::CommissioningWindowReopened,
                Err(error) => TelemetryEventKind::CommissioningWindowFailed(error),
            };
            self.telemetry.record(outcome, now);
        }
    }

    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Returns `true` once defaults were applied during the current Ready sojourn.
    #[must_use]
    pub fn ready_actions_applied(&self) -> bool {
        self.ready_applied
    }

    #[must_use]
    pub fn bindings(&self) -> &[EndpointBinding] {
        self.bridge.bindings()
    }

    #[must_use]
    pub fn bridge(&self) -> &AttributeBridge<N> {
        &self.bridge
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder<H::Instant> {
        &self.telemetry
    }

    #[must_use]
    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    #[must_use]
    pub fn io(&self) -> &H {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut H {
        &mut self.io
    }

    /// Captures the current runtime state for status reporting.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot<N> {
        let relays = self
            .bridge
            .relays()
            .iter()
            .zip(self.bridge.bindings())
            .map(|(relay, binding)| RelaySnapshot {
                relay: relay.id(),
                endpoint: binding.endpoint,
                on: relay.current_state(),
                synced: relay.is_synced(),
            })
            .collect();

        StatusSnapshot {
            phase: self.phase,
            commissioned: self.stack.is_commissioned(),
            connected: self.stack.is_network_connected(),
            commissioning_window_open: self.stack.is_commissioning_window_open(),
            ready_actions_applied: self.ready_applied,
            relays,
            indicator_intensity: self.indicator.intensity(),
            button: self.button.state(),
            telemetry_records: self.telemetry.len(),
        }
    }

    fn apply_defaults(&mut self) {
        let relays: Vec<RelayId, N> = self
            .bridge
            .bindings()
            .iter()
            .map(|binding| binding.relay)
            .collect();

        let mut failures: u8 = 0;
        for relay in &relays {
            if let Err(error) =
                self.bridge
                    .apply_default(&self.stack, &mut self.io, &mut self.telemetry, *relay)
            {
                failures = failures.saturating_add(1);
                self.telemetry.record(
                    TelemetryEventKind::DefaultApplyFailed {
                        relay: *relay,
                        error,
                    },
                    self.io.now(),
                );
            }
        }

        self.telemetry.record(
            TelemetryEventKind::DefaultsApplied {
                relays: u8::try_from(relays.len()).unwrap_or(u8::MAX),
                failures,
            },
            self.io.now(),
        );
    }

    /// Returns `true` when the event triggered a factory reset.
    fn handle_button(&mut self, event: ButtonEvent) -> bool {
        let now = self.io.now();
        match event {
            ButtonEvent::Pressed => {
                self.telemetry.record(TelemetryEventKind::ButtonPressed, now);
                if let Err(error) = self.bridge.toggle(&mut self.stack, BUTTON_RELAY) {
                    self.telemetry.record(
                        TelemetryEventKind::ToggleFailed {
                            relay: BUTTON_RELAY,
                            error,
                        },
                        now,
                    );
                }
                false
            }
            ButtonEvent::ShortRelease(held) => {
                self.telemetry
                    .record(TelemetryEventKind::ButtonReleased { held, long: false }, now);
                false
            }
            ButtonEvent::LongRelease(held) => {
                self.telemetry
                    .record(TelemetryEventKind::ButtonReleased { held, long: true }, now);
                self.telemetry
                    .record(TelemetryEventKind::FactoryResetRequested, now);
                self.stack.factory_reset();
                true
            }
        }
    }
}

impl<S, H, const N: usize> AccessoryStateMachine<S, H, N>
where
    S: ProtocolStack + InboundQueue,
    H: HardwareIo,
{
    /// Runs the pre-update hook for one queued write and reports the verdict.
    pub fn process_inbound(&mut self, write: AttributeWrite) -> Result<(), AccessoryError> {
        let result = self.on_attribute_pre_update(write.path, write.value);
        if let Err(error) = result {
            let now = self.io.now();
            self.telemetry.record(
                TelemetryEventKind::InboundRejected {
                    endpoint: write.path.endpoint,
                    error,
                },
                now,
            );
        }
        self.stack.finish_inbound(write, result.is_ok());
        result
    }

    /// Processes every queued inbound write; returns how many were handled.
    pub fn drain_inbound(&mut self) -> usize {
        let mut handled = 0;
        while let Some(write) = self.stack.next_inbound() {
            // Rejections are already in telemetry.
            let _ = self.process_inbound(write);
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_derivation_covers_every_flag_pair() {
        let table = [
            (false, false, Phase::Commissioning),
            (false, true, Phase::Commissioning),
            (true, false, Phase::Connecting),
            (true, true, Phase::Ready),
        ];
        for (commissioned, connected, expected) in table {
            assert_eq!(Phase::derive(commissioned, connected), expected);
        }
    }

    #[test]
    fn default_config_matches_reference_board() {
        let config = AccessoryConfig::default();
        assert_eq!(config.relay_pins, DEFAULT_RELAY_PINS);
        assert!(config.default_power);
        assert_eq!(config.button.pin, PinId(0));
        assert_eq!(config.indicator.pin, PinId(1));
        assert_eq!(config.status_log_interval, Duration::from_secs(5));
        assert_eq!(config.commissioning_window, Duration::from_secs(300));
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = AccessoryConfig::new([PinId(3)])
            .with_default_power(false)
            .with_status_log_interval(Duration::from_secs(1));
        assert!(!config.default_power);
        assert_eq!(config.status_log_interval, Duration::from_secs(1));
        assert_eq!(Phase::Ready.as_str(), "ready");
    }
}
