//! Telemetry event catalog and the bounded ring that stores it.
//!
//! The core never writes to a console. Everything worth reporting is pushed
//! into a [`TelemetryRecorder`] and the surrounding runtime decides how to
//! surface it (defmt on the MCU, stdout in the emulator).

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::accessory::Phase;
use crate::error::AccessoryError;
use crate::hal::IoError;
use crate::relay::RelayId;
use crate::stack::{EndpointId, StackError, StackEvent};

/// Monotonic telemetry sequence number.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// How loudly a record should be surfaced by the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Discriminated telemetry events emitted by the accessory runtime.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    PhaseChanged {
        from: Option<Phase>,
        to: Phase,
    },
    AwaitingCommissioning,
    AwaitingNetwork,
    /// Ready-entry reconciliation finished.
    DefaultsApplied {
        relays: u8,
        failures: u8,
    },
    RelayApplied {
        relay: RelayId,
        on: bool,
    },
    RelayWriteFailed {
        relay: RelayId,
        error: IoError,
    },
    IndicatorWriteFailed(IoError),
    ButtonPressed,
    ButtonReleased {
        held: Duration,
        long: bool,
    },
    FactoryResetRequested,
    ToggleFailed {
        relay: RelayId,
        error: AccessoryError,
    },
    DefaultApplyFailed {
        relay: RelayId,
        error: AccessoryError,
    },
    InboundRejected {
        endpoint: EndpointId,
        error: AccessoryError,
    },
    IdentifyRequested {
        endpoint: EndpointId,
        effect: u8,
        variant: u8,
    },
    CommissioningWindowReopened,
    CommissioningWindowFailed(StackError),
    Stack(StackEvent),
}

impl TelemetryEventKind {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            TelemetryEventKind::RelayWriteFailed { .. }
            | TelemetryEventKind::ToggleFailed { .. }
            | TelemetryEventKind::DefaultApplyFailed { .. }
            | TelemetryEventKind::InboundRejected { .. }
            | TelemetryEventKind::CommissioningWindowFailed(_) => Severity::Error,
            TelemetryEventKind::IndicatorWriteFailed(_)
            | TelemetryEventKind::FactoryResetRequested
            | TelemetryEventKind::Stack(StackEvent::FailSafeTimerExpired) => Severity::Warn,
            TelemetryEventKind::RelayApplied { .. } | TelemetryEventKind::ButtonPressed => {
                Severity::Debug
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::PhaseChanged { from: None, to } => write!(f, "phase {to}"),
            TelemetryEventKind::PhaseChanged { from: Some(from), to } => {
                write!(f, "phase {from} -> {to}")
            }
            TelemetryEventKind::AwaitingCommissioning => {
                f.write_str("waiting for commissioning")
            }
            TelemetryEventKind::AwaitingNetwork => f.write_str("commissioned, waiting for network"),
            TelemetryEventKind::DefaultsApplied { relays, failures } => {
                write!(f, "ready: applied defaults to {relays} relays ({failures} failed)")
            }
            TelemetryEventKind::RelayApplied { relay, on } => {
                write!(f, "{relay} -> {}", if *on { "ON" } else { "OFF" })
            }
            TelemetryEventKind::RelayWriteFailed { relay, error } => {
                write!(f, "{relay} write failed: {error}")
            }
            TelemetryEventKind::IndicatorWriteFailed(error) => {
                write!(f, "status LED write failed: {error}")
            }
            TelemetryEventKind::ButtonPressed => f.write_str("button pressed"),
            TelemetryEventKind::ButtonReleased { held, long } => write!(
                f,
                "button released after {} ms{}",
                held.as_millis(),
                if *long { " (long)" } else { "" }
            ),
            TelemetryEventKind::FactoryResetRequested => f.write_str("factory reset requested"),
            TelemetryEventKind::ToggleFailed { relay, error } => {
                write!(f, "toggle {relay} failed: {error}")
            }
            TelemetryEventKind::DefaultApplyFailed { relay, error } => {
                write!(f, "default for {relay} failed: {error}")
            }
            TelemetryEventKind::InboundRejected { endpoint, error } => {
                write!(f, "inbound write on endpoint {endpoint} rejected: {error}")
            }
            TelemetryEventKind::IdentifyRequested {
                endpoint,
                effect,
                variant,
            } => write!(
                f,
                "identify endpoint {endpoint} effect {effect} variant {variant}"
            ),
            TelemetryEventKind::CommissioningWindowReopened => {
                f.write_str("last fabric removed, commissioning window reopened")
            }
            TelemetryEventKind::CommissioningWindowFailed(error) => {
                write!(f, "failed to open commissioning window: {error}")
            }
            TelemetryEventKind::Stack(event) => write!(f, "stack event {event:?}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the records written after `cursor` (all retained records for `None`).
    pub fn records_after(
        &self,
        cursor: Option<EventId>,
    ) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring
            .oldest_ordered()
            .filter(move |record| cursor.is_none_or(|seen| record.id > seen))
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the id the next record will receive.
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a telemetry event.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
