//! Status surface shared by the firmware log and the emulator `status` command.
//!
//! [`AccessoryStateMachine::snapshot`] captures a [`StatusSnapshot`];
//! [`StatusFormatter`] keeps the textual rendering consistent across front-ends.
//!
//! [`AccessoryStateMachine::snapshot`]: crate::AccessoryStateMachine::snapshot

use core::fmt;

use heapless::Vec;

use crate::accessory::Phase;
use crate::button::ButtonState;
use crate::relay::RelayId;
use crate::stack::EndpointId;

/// Sampled state for a single relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub relay: RelayId,
    pub endpoint: EndpointId,
    pub on: bool,
    pub synced: bool,
}

/// Snapshot of the accessory runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot<const N: usize> {
    /// `None` until the first tick ran.
    pub phase: Option<Phase>,
    pub commissioned: bool,
    pub connected: bool,
    pub commissioning_window_open: bool,
    pub ready_actions_applied: bool,
    pub relays: Vec<RelaySnapshot, N>,
    pub indicator_intensity: u8,
    pub button: ButtonState,
    pub telemetry_records: usize,
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a, const N: usize> {
    snapshot: &'a StatusSnapshot<N>,
}

impl<'a, const N: usize> StatusFormatter<'a, N> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot<N>) -> Self {
        Self { snapshot }
    }

    /// Writes the phase line (e.g. `phase ready commissioned=yes network=up window=closed`).
    pub fn write_phase_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("phase ")?;
        match self.snapshot.phase {
            Some(phase) => writer.write_str(phase.as_str())?,
            None => writer.write_str("starting")?,
        }
        write!(
            writer,
            " commissioned={} network={} window={}",
            yes_no(self.snapshot.commissioned),
            if self.snapshot.connected { "up" } else { "down" },
            if self.snapshot.commissioning_window_open {
                "open"
            } else {
                "closed"
            },
        )
    }

    /// Writes the relay line (e.g. `relays 0@ep1=on 1@ep2=off!`); `!` marks an unsynced relay.
    pub fn write_relays_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("relays")?;
        if self.snapshot.relays.is_empty() {
            return writer.write_str(" none");
        }
        for relay in &self.snapshot.relays {
            write!(
                writer,
                " {}@ep{}={}",
                relay.relay.0,
                relay.endpoint,
                if relay.on { "on" } else { "off" }
            )?;
            if !relay.synced {
                writer.write_char('!')?;
            }
        }
        Ok(())
    }

    /// Writes the local IO line (e.g. `io led=255 button=idle defaults=applied events=12`).
    pub fn write_io_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "io led={} button={} defaults={} events={}",
            self.snapshot.indicator_intensity,
            match self.snapshot.button {
                ButtonState::Idle => "idle",
                ButtonState::Pressed => "pressed",
            },
            if self.snapshot.ready_actions_applied {
                "applied"
            } else {
                "pending"
            },
            self.snapshot.telemetry_records,
        )
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn snapshot() -> StatusSnapshot<2> {
        let mut relays = Vec::new();
        relays
            .push(RelaySnapshot {
                relay: RelayId(0),
                endpoint: 1,
                on: true,
                synced: true,
            })
            .unwrap();
        relays
            .push(RelaySnapshot {
                relay: RelayId(1),
                endpoint: 2,
                on: false,
                synced: false,
            })
            .unwrap();

        StatusSnapshot {
            phase: Some(Phase::Ready),
            commissioned: true,
            connected: true,
            commissioning_window_open: false,
            ready_actions_applied: true,
            relays,
            indicator_intensity: 255,
            button: ButtonState::Idle,
            telemetry_records: 12,
        }
    }

    #[test]
    fn renders_every_line() {
        let snapshot = snapshot();
        let formatter = StatusFormatter::new(&snapshot);

        let mut line: String<96> = String::new();
        formatter.write_phase_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "phase ready commissioned=yes network=up window=closed"
        );

        line.clear();
        formatter.write_relays_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "relays 0@ep1=on 1@ep2=off!");

        line.clear();
        formatter.write_io_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "io led=255 button=idle defaults=applied events=12"
        );
    }

    #[test]
    fn phase_before_first_tick_is_starting() {
        let mut snapshot = snapshot();
        snapshot.phase = None;
        snapshot.commissioned = false;
        snapshot.connected = false;
        snapshot.commissioning_window_open = true;

        let mut line: String<96> = String::new();
        StatusFormatter::new(&snapshot)
            .write_phase_line(&mut line)
            .unwrap();
        assert_eq!(
            line.as_str(),
            "phase starting commissioned=no network=down window=open"
        );
    }
}
