//! Synchronisation between the stack's attribute store and the relay outputs.
//!
//! The bridge is the only writer on both sides. Physical relays change only
//! from the inbound pre-update path (or the Ready-entry reconciliation), and
//! local requests such as the button toggle are submitted to the stack so they
//! come back through that same inbound path.

use heapless::Vec;

use crate::error::{AccessoryError, ConfigurationError, InitError};
use crate::hal::{HardwareIo, IoError, PinId};
use crate::relay::{RelayId, RelayOutput};
use crate::stack::{AttributePath, AttributeValue, EndpointId, ProtocolStack, StackError};
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};

/// One relay bound to the endpoint the stack issued for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EndpointBinding {
    pub relay: RelayId,
    pub endpoint: EndpointId,
}

/// Inbound capabilities registered with the protocol stack.
pub trait AttributeCallbacks {
    /// Runs before the stack commits an attribute write; an error vetoes it.
    fn on_inbound_attribute_change(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), AccessoryError>;

    /// Handles an identify request for `endpoint`.
    fn on_identify(
        &mut self,
        endpoint: EndpointId,
        effect: u8,
        variant: u8,
    ) -> Result<(), AccessoryError>;
}

/// Owns the relay outputs and their endpoint bindings.
#[derive(Debug)]
pub struct AttributeBridge<const N: usize> {
    relays: Vec<RelayOutput, N>,
    bindings: Vec<EndpointBinding, N>,
}

impl<const N: usize> AttributeBridge<N> {
    /// Drives every relay low, then registers one on/off endpoint per relay.
    pub fn bind<S, H>(
        stack: &mut S,
        io: &mut H,
        pins: &[PinId],
        default_power: bool,
    ) -> Result<Self, InitError>
    where
        S: ProtocolStack,
        H: HardwareIo,
    {
        if pins.len() > N || pins.len() > usize::from(u8::MAX) + 1 {
            return Err(ConfigurationError::TooManyRelays.into());
        }

        let mut relays = Vec::new();
        for (index, pin) in pins.iter().enumerate() {
            let relay = RelayId(u8::try_from(index).map_err(|_| ConfigurationError::TooManyRelays)?);
            let mut output = RelayOutput::new(relay, *pin);
            output
                .init(io)
                .map_err(|error| InitError::RelayInit { relay, error })?;
            relays
                .push(output)
                .map_err(|_| ConfigurationError::TooManyRelays)?;
        }

        let mut bindings: Vec<EndpointBinding, N> = Vec::new();
        for output in &relays {
            let relay = output.id();
            let endpoint = stack
                .add_on_off_endpoint(default_power)
                .map_err(|error| InitError::EndpointBinding { relay, error })?;
            if bindings.iter().any(|binding| binding.endpoint == endpoint) {
                return Err(InitError::DuplicateEndpoint { relay, endpoint });
            }
            bindings
                .push(EndpointBinding { relay, endpoint })
                .map_err(|_| ConfigurationError::TooManyRelays)?;
        }

        Ok(Self { relays, bindings })
    }

    #[must_use]
    pub fn bindings(&self) -> &[EndpointBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn relays(&self) -> &[RelayOutput] {
        &self.relays
    }

    #[must_use]
    pub fn relay(&self, relay: RelayId) -> Option<&RelayOutput> {
        self.relays.get(relay.index())
    }

    pub fn endpoint_for(&self, relay: RelayId) -> Result<EndpointId, ConfigurationError> {
        self.bindings
            .iter()
            .find(|binding| binding.relay == relay)
            .map(|binding| binding.endpoint)
            .ok_or(ConfigurationError::UnknownRelay(relay))
    }

    #[must_use]
    pub fn relay_for(&self, endpoint: EndpointId) -> Option<RelayId> {
        self.bindings
            .iter()
            .find(|binding| binding.endpoint == endpoint)
            .map(|binding| binding.relay)
    }

    /// Pre-update hook: applies on/off writes for bound endpoints.
    ///
    /// Attributes the bridge does not own pass through untouched. A failed
    /// physical write is recorded and the update still goes ahead.
    pub fn on_inbound_change<H>(
        &mut self,
        io: &mut H,
        telemetry: &mut TelemetryRecorder<H::Instant>,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), AccessoryError>
    where
        H: HardwareIo,
    {
        if !path.is_on_off() {
            return Ok(());
        }
        let Some(relay) = self.relay_for(path.endpoint) else {
            return Ok(());
        };
        let on = value
            .as_bool()
            .ok_or(AccessoryError::Protocol(StackError::InvalidValue))?;

        if let Err(error) = self.apply_power(io, telemetry, relay, on) {
            telemetry.record(TelemetryEventKind::RelayWriteFailed { relay, error }, io.now());
        }
        Ok(())
    }

    /// Applies the power value currently stored by the stack to `relay`.
    pub fn apply_default<S, H>(
        &mut self,
        stack: &S,
        io: &mut H,
        telemetry: &mut TelemetryRecorder<H::Instant>,
        relay: RelayId,
    ) -> Result<(), AccessoryError>
    where
        S: ProtocolStack,
        H: HardwareIo,
    {
        let endpoint = self.endpoint_for(relay)?;
        let on = stack
            .get_attribute(AttributePath::on_off(endpoint))?
            .as_bool()
            .ok_or(AccessoryError::Protocol(StackError::InvalidValue))?;

        self.apply_power(io, telemetry, relay, on)
            .map_err(|error| AccessoryError::TransientIo { relay, error })
    }

    /// Asks the stack to invert the stored power value of `relay`.
    ///
    /// Returns the requested value. The relay itself changes when the stack
    /// delivers the write back through the pre-update hook.
    pub fn toggle<S>(&self, stack: &mut S, relay: RelayId) -> Result<bool, AccessoryError>
    where
        S: ProtocolStack,
    {
        let path = AttributePath::on_off(self.endpoint_for(relay)?);
        let current = stack
            .get_attribute(path)?
            .as_bool()
            .ok_or(AccessoryError::Protocol(StackError::InvalidValue))?;
        stack.set_attribute(path, AttributeValue::Bool(!current))?;
        Ok(!current)
    }

    fn apply_power<H>(
        &mut self,
        io: &mut H,
        telemetry: &mut TelemetryRecorder<H::Instant>,
        relay: RelayId,
        on: bool,
    ) -> Result<(), IoError>
    where
        H: HardwareIo,
    {
        let Some(output) = self.relays.get_mut(relay.index()) else {
            return Ok(());
        };
        if output.set_power(io, on)? {
            telemetry.record(TelemetryEventKind::RelayApplied { relay, on }, io.now());
        }
        Ok(())
    }
}

/// Callback handle lending the bridge together with the IO it drives.
pub struct BridgeCallbacks<'a, H: HardwareIo, const N: usize> {
    bridge: &'a mut AttributeBridge<N>,
    io: &'a mut H,
    telemetry: &'a mut TelemetryRecorder<H::Instant>,
}

impl<'a, H: HardwareIo, const N: usize> BridgeCallbacks<'a, H, N> {
    pub fn new(
        bridge: &'a mut AttributeBridge<N>,
        io: &'a mut H,
        telemetry: &'a mut TelemetryRecorder<H::Instant>,
    ) -> Self {
        Self {
            bridge,
            io,
            telemetry,
        }
    }
}

impl<H: HardwareIo, const N: usize> AttributeCallbacks for BridgeCallbacks<'_, H, N> {
    fn on_inbound_attribute_change(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), AccessoryError> {
        self.bridge
            .on_inbound_change(&mut *self.io, &mut *self.telemetry, path, value)
    }

    fn on_identify(
        &mut self,
        endpoint: EndpointId,
        effect: u8,
        variant: u8,
    ) -> Result<(), AccessoryError> {
        self.telemetry.record(
            TelemetryEventKind::IdentifyRequested {
                endpoint,
                effect,
                variant,
            },
            self.io.now(),
        );
        Ok(())
    }
}
