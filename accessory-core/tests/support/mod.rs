#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use accessory_core::accessory::{AccessoryConfig, RELAY_COUNT, TICK_INTERVAL};
use accessory_core::hal::{HardwareIo, IoError, Level, PinId};
use accessory_core::stack::{
    AttributePath, AttributeValue, AttributeWrite, EndpointId, InboundQueue, ProtocolStack,
    StackError,
};
use accessory_core::telemetry::TelemetryEventKind;
use accessory_core::time::Millis;
use accessory_core::{AccessoryStateMachine, TickReport};

pub const FIRST_ENDPOINT: EndpointId = 1;
pub const BUTTON_PIN: PinId = PinId(0);
pub const LED_PIN: PinId = PinId(1);

pub type Accessory = AccessoryStateMachine<MockStack, MockIo, RELAY_COUNT>;

/// In-memory stack that queues writes for the pre-update hook like a real one.
#[derive(Debug, Default)]
pub struct MockStack {
    pub commissioned: bool,
    pub connected: bool,
    pub window_open: bool,
    pub started: bool,
    pub values: Vec<bool>,
    pub pending: VecDeque<AttributeWrite>,
    pub committed: Vec<AttributeWrite>,
    pub dropped: Vec<AttributeWrite>,
    pub factory_resets: u32,
    pub window_requests: Vec<Duration>,
    pub fail_node: bool,
    pub fail_endpoint_at: Option<usize>,
    pub fail_start: bool,
    pub fail_reads: bool,
    pub window_error: Option<StackError>,
}

impl MockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, endpoint: EndpointId) -> Option<bool> {
        self.values.get(index_of(endpoint)?).copied()
    }

    /// Simulates a controller writing the on/off attribute.
    pub fn remote_write(&mut self, endpoint: EndpointId, value: AttributeValue) {
        self.pending
            .push_back(AttributeWrite::new(AttributePath::on_off(endpoint), value));
    }
}

fn index_of(endpoint: EndpointId) -> Option<usize> {
    usize::from(endpoint).checked_sub(usize::from(FIRST_ENDPOINT))
}

impl ProtocolStack for MockStack {
    fn create_node(&mut self) -> Result<(), StackError> {
        if self.fail_node {
            Err(StackError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn add_on_off_endpoint(&mut self, initial: bool) -> Result<EndpointId, StackError> {
        if self.fail_endpoint_at == Some(self.values.len()) {
            return Err(StackError::Rejected);
        }
        self.values.push(initial);
        let offset = u16::try_from(self.values.len() - 1).map_err(|_| StackError::Unavailable)?;
        Ok(FIRST_ENDPOINT + offset)
    }

    fn start(&mut self) -> Result<(), StackError> {
        if self.fail_start {
            return Err(StackError::Unavailable);
        }
        self.started = true;
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

    fn open_commissioning_window(&mut self, timeout: Duration) -> Result<(), StackError> {
        self.window_requests.push(timeout);
        match self.window_error {
            Some(error) => Err(error),
            None => {
                self.window_open = true;
                Ok(())
            }
        }
    }

    fn factory_reset(&mut self) {
        self.factory_resets += 1;
        self.commissioned = false;
        self.connected = false;
    }

    fn get_attribute(&self, path: AttributePath) -> Result<AttributeValue, StackError> {
        if self.fail_reads {
            return Err(StackError::Busy);
        }
        if !path.is_on_off() {
            return Err(StackError::NotFound);
        }
        self.stored(path.endpoint)
            .map(AttributeValue::Bool)
            .ok_or(StackError::NotFound)
    }

    fn set_attribute(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), StackError> {
        if !path.is_on_off() || self.stored(path.endpoint).is_none() {
            return Err(StackError::NotFound);
        }
        self.pending.push_back(AttributeWrite::new(path, value));
        Ok(())
    }
}

impl InboundQueue for MockStack {
    fn next_inbound(&mut self) -> Option<AttributeWrite> {
        self.pending.pop_front()
    }

    fn finish_inbound(&mut self, write: AttributeWrite, accepted: bool) {
        if !accepted {
            self.dropped.push(write);
            return;
        }
        if let (true, Some(index), Some(on)) = (
            write.path.is_on_off(),
            index_of(write.path.endpoint),
            write.value.as_bool(),
        ) {
            if let Some(slot) = self.values.get_mut(index) {
                *slot = on;
            }
        }
        self.committed.push(write);
    }
}

/// Board double with a manually advanced clock.
#[derive(Debug)]
pub struct MockIo {
    pub now: Millis,
    pub levels: [Level; 32],
    pub button_level: Level,
    pub led_writes: Vec<u8>,
    pub failing_pin: Option<PinId>,
}

impl MockIo {
    pub fn new() -> Self {
        Self {
            now: Millis::ZERO,
            levels: [Level::Low; 32],
            button_level: Level::High,
            led_writes: Vec::new(),
            failing_pin: None,
        }
    }

    pub fn level(&self, pin: PinId) -> Level {
        self.levels[usize::from(pin.raw())]
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = self.now + by;
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareIo for MockIo {
    type Instant = Millis;

    fn digital_write(&mut self, pin: PinId, level: Level) -> Result<(), IoError> {
        if self.failing_pin == Some(pin) {
            return Err(IoError::WriteFailed(pin));
        }
        let slot = self
            .levels
            .get_mut(usize::from(pin.raw()))
            .ok_or(IoError::UnknownPin(pin))?;
        *slot = level;
        Ok(())
    }

    fn digital_read(&mut self, pin: PinId) -> Level {
        if pin == BUTTON_PIN {
            self.button_level
        } else {
            self.level(pin)
        }
    }

    fn analog_write(&mut self, pin: PinId, intensity: u8) -> Result<(), IoError> {
        if pin != LED_PIN {
            return Err(IoError::UnknownPin(pin));
        }
        self.led_writes.push(intensity);
        Ok(())
    }

    fn now(&self) -> Millis {
        self.now
    }
}

pub fn accessory() -> Accessory {
    accessory_with(MockStack::new())
}

pub fn accessory_with(stack: MockStack) -> Accessory {
    AccessoryStateMachine::initialize(stack, MockIo::new(), AccessoryConfig::default()).unwrap()
}

/// Commissioned, connected and ticked once so the Ready entry already ran.
pub fn ready_accessory() -> Accessory {
    let mut accessory = accessory();
    accessory.stack_mut().commissioned = true;
    accessory.stack_mut().connected = true;
    let report = tick(&mut accessory);
    assert!(report.defaults_applied);
    accessory
}

/// Runs one tick, lets the stack deliver queued writes and advances the clock.
pub fn tick(accessory: &mut Accessory) -> TickReport {
    let report = accessory.advance();
    accessory.drain_inbound();
    accessory.io_mut().advance(TICK_INTERVAL);
    report
}

/// Ticks until `duration` of simulated time has passed.
pub fn run_for(accessory: &mut Accessory, duration: Duration) -> Vec<TickReport> {
    let end = accessory.io().now + duration;
    let mut reports = Vec::new();
    while accessory.io().now < end {
        reports.push(tick(accessory));
    }
    reports
}

pub fn press(accessory: &mut Accessory) {
    accessory.io_mut().button_level = Level::Low;
}

pub fn release(accessory: &mut Accessory) {
    accessory.io_mut().button_level = Level::High;
}

pub fn count_events(accessory: &Accessory, matches: impl Fn(&TelemetryEventKind) -> bool) -> usize {
    accessory
        .telemetry()
        .oldest_first()
        .filter(|record| matches(&record.event))
        .count()
}
