use std::collections::VecDeque;
use std::time::Duration;

use accessory_core::accessory::{DEFAULT_RELAY_PINS, RELAY_COUNT, TICK_INTERVAL};
use accessory_core::button::DEFAULT_BUTTON_PIN;
use accessory_core::hal::{HardwareIo, IoError, Level, PinId};
use accessory_core::indicator::DEFAULT_LED_PIN;
use accessory_core::stack::{
    AttributePath, AttributeValue, AttributeWrite, EndpointId, InboundQueue, ProtocolStack,
    StackError, StackEvent,
};
use accessory_core::status::StatusFormatter;
use accessory_core::telemetry::{EventId, TelemetryRecord};
use accessory_core::time::Millis;
use accessory_core::{AccessoryConfig, AccessoryStateMachine, InitError};

use crate::command::{self, Command};

/// Time allowed for the debouncer to settle after a simulated release.
const RELEASE_SETTLE: Duration = Duration::from_millis(200);

pub const HELP_TOPICS: &[&str] = &[
    "commission              - admit the accessory to a fabric",
    "connect | disconnect    - bring the operational network up or down",
    "press | release         - drive the button (active low)",
    "hold <duration>         - press, wait, release (e.g. `hold 11s`)",
    "wait <duration>         - advance simulated time",
    "set <endpoint> <on|off|byte> - remote on/off attribute write",
    "identify [endpoint] [effect] - identify request",
    "remove-fabric           - remove the only fabric",
    "status                  - phase, relays and local IO",
    "log                     - dump retained telemetry",
];

/// Simulated commissioning/control stack with a queued pre-update hook.
#[derive(Debug, Default)]
pub struct SimStack {
    commissioned: bool,
    connected: bool,
    window_open: bool,
    started: bool,
    values: Vec<bool>,
    pending: VecDeque<AttributeWrite>,
    factory_resets: u32,
}

impl SimStack {
    fn slot(&self, endpoint: EndpointId) -> Option<usize> {
        let index = usize::from(endpoint).checked_sub(1)?;
        (index < self.values.len()).then_some(index)
    }

    pub fn factory_resets(&self) -> u32 {
        self.factory_resets
    }
}

impl ProtocolStack for SimStack {
    fn add_on_off_endpoint(&mut self, initial: bool) -> Result<EndpointId, StackError> {
        self.values.push(initial);
        EndpointId::try_from(self.values.len()).map_err(|_| StackError::Unavailable)
    }

    fn start(&mut self) -> Result<(), StackError> {
        self.started = true;
        self.window_open = !self.commissioned;
        Ok(())
    }

    fn is_commissioned(&self) -> bool {
        self.commissioned
    }

    fn is_network_connected(&self) -> bool {
        self.connected
    }

    fn is_commissioning_window_open(&self) -> bool {
        self.window_open
    }

    fn open_commissioning_window(&mut self, _timeout: Duration) -> Result<(), StackError> {
        self.window_open = true;
        Ok(())
    }

    fn factory_reset(&mut self) {
        self.factory_resets += 1;
        self.commissioned = false;
        self.connected = false;
        self.window_open = true;
        self.pending.clear();
    }

    fn get_attribute(&self, path: AttributePath) -> Result<AttributeValue, StackError> {
        if !path.is_on_off() {
            return Err(StackError::NotFound);
        }
        self.slot(path.endpoint)
            .map(|index| AttributeValue::Bool(self.values[index]))
            .ok_or(StackError::NotFound)
    }

    fn set_attribute(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), StackError> {
        if !path.is_on_off() || self.slot(path.endpoint).is_none() {
            return Err(StackError::NotFound);
        }
        self.pending.push_back(AttributeWrite::new(path, value));
        Ok(())
    }
}

impl InboundQueue for SimStack {
    fn next_inbound(&mut self) -> Option<AttributeWrite> {
        self.pending.pop_front()
    }

    fn finish_inbound(&mut self, write: AttributeWrite, accepted: bool) {
        if !accepted {
            return;
        }
        if let (Some(index), Some(on)) = (self.slot(write.path.endpoint), write.value.as_bool()) {
            self.values[index] = on;
        }
    }
}

/// Simulated board with relay pins and an active-low button.
#[derive(Debug)]
pub struct SimIo {
    now: Millis,
    relays: [Level; RELAY_COUNT],
    button: Level,
}

impl SimIo {
    fn new() -> Self {
        Self {
            now: Millis::ZERO,
            relays: [Level::Low; RELAY_COUNT],
            button: Level::High,
        }
    }

    fn relay_slot(pin: PinId) -> Result<usize, IoError> {
        DEFAULT_RELAY_PINS
            .iter()
            .position(|candidate| *candidate == pin)
            .ok_or(IoError::UnknownPin(pin))
    }
}

impl HardwareIo for SimIo {
    type Instant = Millis;

    fn digital_write(&mut self, pin: PinId, level: Level) -> Result<(), IoError> {
        let slot = Self::relay_slot(pin)?;
        self.relays[slot] = level;
        Ok(())
    }

    fn digital_read(&mut self, pin: PinId) -> Level {
        if pin == DEFAULT_BUTTON_PIN {
            return self.button;
        }
        Self::relay_slot(pin).map_or(Level::Low, |slot| self.relays[slot])
    }

    fn analog_write(&mut self, pin: PinId, _intensity: u8) -> Result<(), IoError> {
        // The status line reports the indicator level.
        if pin == DEFAULT_LED_PIN {
            Ok(())
        } else {
            Err(IoError::UnknownPin(pin))
        }
    }

    fn now(&self) -> Millis {
        self.now
    }
}

type SimAccessory = AccessoryStateMachine<SimStack, SimIo, RELAY_COUNT>;

pub struct Session {
    accessory: SimAccessory,
    log_cursor: Option<EventId>,
}

impl Session {
    pub fn new() -> Result<Self, InitError> {
        let accessory = AccessoryStateMachine::initialize(
            SimStack::default(),
            SimIo::new(),
            AccessoryConfig::default(),
        )?;
        let mut session = Self {
            accessory,
            log_cursor: None,
        };
        session.tick();
        Ok(session)
    }

    #[cfg(test)]
    pub fn accessory(&self) -> &SimAccessory {
        &self.accessory
    }

    pub fn now(&self) -> Millis {
        self.accessory.io().now
    }

    /// Runs one console line and returns the response followed by new telemetry.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let command = match command::parse(line) {
            Ok(command) => command,
            Err(error) => return vec![format!("ERR syntax {error}")],
        };

        // `log` already lists everything retained.
        let listing = matches!(command, Command::Log);
        let mut lines = self.execute(command);
        if !listing {
            lines.extend(self.drain_telemetry());
        }
        lines
    }

    fn execute(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Commission => {
                let stack = self.accessory.stack_mut();
                stack.commissioned = true;
                stack.window_open = false;
                self.accessory
                    .on_stack_event(StackEvent::CommissioningComplete);
                self.tick();
                vec!["OK commissioned".to_string()]
            }
            Command::Connect => {
                self.accessory.stack_mut().connected = true;
                self.accessory
                    .on_stack_event(StackEvent::InterfaceAddressChanged { ipv6: true });
                self.tick();
                vec!["OK network up".to_string()]
            }
            Command::Disconnect => {
                self.accessory.stack_mut().connected = false;
                self.tick();
                vec!["OK network down".to_string()]
            }
            Command::Press => {
                self.accessory.io_mut().button = Level::Low;
                self.tick();
                vec!["OK button pressed".to_string()]
            }
            Command::Release => {
                self.accessory.io_mut().button = Level::High;
                self.run_for(RELEASE_SETTLE);
                vec!["OK button released".to_string()]
            }
            Command::Hold(duration) => {
                self.accessory.io_mut().button = Level::Low;
                self.run_for(duration);
                self.accessory.io_mut().button = Level::High;
                self.run_for(RELEASE_SETTLE);
                vec![format!("OK held {} ms", duration.as_millis())]
            }
            Command::Wait(duration) => {
                self.run_for(duration);
                vec![format!("OK t={}ms", self.now().as_millis())]
            }
            Command::Set { endpoint, value } => {
                let write = AttributeWrite::new(AttributePath::on_off(endpoint), value);
                match self.accessory.process_inbound(write) {
                    Ok(()) => vec![format!("OK ep{endpoint} {}", describe(value))],
                    Err(error) => vec![format!("ERR rejected {error}")],
                }
            }
            Command::Identify { endpoint, effect } => {
                match self.accessory.on_identify(endpoint, effect, 0) {
                    Ok(()) => vec![format!("OK identify ep{endpoint}")],
                    Err(error) => vec![format!("ERR identify {error}")],
                }
            }
            Command::RemoveFabric => {
                let stack = self.accessory.stack_mut();
                stack.commissioned = false;
                stack.connected = false;
                self.accessory.on_stack_event(StackEvent::FabricRemoved);
                self.tick();
                vec!["OK fabric removed".to_string()]
            }
            Command::Status => self.status_lines(),
            Command::Log => {
                let mut lines = vec![LISTING_HEADER.to_string()];
                lines.extend(self.accessory.telemetry().oldest_first().map(format_record));
                self.log_cursor = self.accessory.telemetry().latest().map(|record| record.id);
                lines
            }
            Command::Help => {
                let mut lines = vec!["Available commands:".to_string()];
                lines.extend(HELP_TOPICS.iter().map(|topic| format!("  {topic}")));
                lines
            }
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let snapshot = self.accessory.snapshot();
        let formatter = StatusFormatter::new(&snapshot);
        let mut phase = String::new();
        let mut relays = String::new();
        let mut io = String::new();
        // Writing into a String cannot fail.
        let _ = formatter.write_phase_line(&mut phase);
        let _ = formatter.write_relays_line(&mut relays);
        let _ = formatter.write_io_line(&mut io);
        vec![
            format!(
                "t={}ms factory-resets={}",
                self.now().as_millis(),
                self.accessory.stack().factory_resets()
            ),
            phase,
            relays,
            io,
        ]
    }

    fn tick(&mut self) {
        self.accessory.advance();
        self.accessory.drain_inbound();
        let io = self.accessory.io_mut();
        io.now = io.now + TICK_INTERVAL;
    }

    fn run_for(&mut self, duration: Duration) {
        let end = self.now() + duration;
        while self.now() < end {
            self.tick();
        }
    }

    fn drain_telemetry(&mut self) -> Vec<String> {
        let lines: Vec<String> = self
            .accessory
            .telemetry()
            .records_after(self.log_cursor)
            .map(format_record)
            .collect();
        if let Some(latest) = self.accessory.telemetry().latest() {
            self.log_cursor = Some(latest.id);
        }
        lines
    }
}

const LISTING_HEADER: &str = "telemetry (oldest first):";

fn format_record(record: &TelemetryRecord<Millis>) -> String {
    format!(
        "  [{:>7}ms] #{} {}",
        record.timestamp.as_millis(),
        record.id,
        record.event
    )
}

fn describe(value: AttributeValue) -> String {
    match value {
        AttributeValue::Bool(true) => "on".to_string(),
        AttributeValue::Bool(false) => "off".to_string(),
        other => format!("{other:?}"),
    }
}
