//! Shared protocol-stack adapter.
//!
//! The network side of the firmware owns a `SharedStack` and publishes
//! commissioning state, stack events and remote attribute writes through it.
//! The accessory task holds a [`StackHandle`], which exposes the same state via
//! the `accessory-core` stack traits. Writes wait in the inbound channel until
//! the accessory runs the pre-update hook and commits or drops them.

use core::cell::RefCell;
use core::time::Duration;

use accessory_core::stack::{
    AttributePath, AttributeValue, AttributeWrite, EndpointId, InboundQueue, ProtocolStack,
    StackError, StackEvent,
};
use embassy_sync::blocking_mutex::Mutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Maximum number of on/off endpoints the attribute table can hold.
pub const MAX_ENDPOINTS: usize = 8;

/// Depth of the queue of writes waiting for the pre-update hook.
pub const INBOUND_QUEUE_DEPTH: usize = 8;

/// Depth of the stack event queue.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Endpoint 0 is the root node; relays start at 1.
const FIRST_ENDPOINT: EndpointId = 1;

#[cfg(target_os = "none")]
type StackMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type StackMutex = NoopRawMutex;

/// Queue of writes waiting for the pre-update hook.
pub type InboundChannel = Channel<StackMutex, AttributeWrite, INBOUND_QUEUE_DEPTH>;

/// Queue of lifecycle events for the accessory task.
pub type EventChannel = Channel<StackMutex, StackEvent, EVENT_QUEUE_DEPTH>;

type AttributeTable = Mutex<StackMutex, RefCell<Vec<bool, MAX_ENDPOINTS>>>;

/// State shared between the network side and the accessory task.
pub struct SharedStack {
    started: AtomicBool,
    commissioned: AtomicBool,
    connected: AtomicBool,
    window_open: AtomicBool,
    window_timeout_s: AtomicU32,
    reset_requested: AtomicBool,
    attributes: AttributeTable,
    inbound: InboundChannel,
    events: EventChannel,
}

impl SharedStack {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            commissioned: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            window_open: AtomicBool::new(false),
            window_timeout_s: AtomicU32::new(0),
            reset_requested: AtomicBool::new(false),
            attributes: Mutex::new(RefCell::new(Vec::new())),
            inbound: Channel::new(),
            events: Channel::new(),
        }
    }

    /// Returns the accessory-facing handle.
    #[must_use]
    pub const fn handle(&self) -> StackHandle<'_> {
        StackHandle { shared: self }
    }

    /// Marks the accessory as admitted to (or removed from) its fabric.
    pub fn set_commissioned(&self, commissioned: bool) {
        let previous = self.commissioned.swap(commissioned, Ordering::AcqRel);
        if commissioned && !previous {
            self.window_open.store(false, Ordering::Release);
            self.publish(StackEvent::CommissioningComplete);
            self.publish(StackEvent::CommissioningWindowClosed);
        }
    }

    /// Updates operational network connectivity.
    pub fn set_network_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if connected && !previous {
            self.publish(StackEvent::InterfaceAddressChanged { ipv6: true });
        }
    }

    /// Removes the only fabric, returning the accessory to uncommissioned.
    pub fn remove_fabric(&self) {
        self.publish(StackEvent::FabricWillBeRemoved);
        self.commissioned.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        self.publish(StackEvent::FabricRemoved);
    }

    /// Queues a controller write for the pre-update hook.
    pub fn submit_write(&self, write: AttributeWrite) -> Result<(), StackError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(StackError::Unavailable);
        }
        if !write.path.is_on_off() {
            return Err(StackError::NotFound);
        }
        self.stored(write.path.endpoint).ok_or(StackError::NotFound)?;
        self.inbound.try_send(write).map_err(|TrySendError::Full(_)| StackError::Busy)
    }

    /// Queues a stack event; events are dropped when the queue is full.
    pub fn publish(&self, event: StackEvent) -> bool {
        self.events.try_send(event).is_ok()
    }

    /// Pops the next pending stack event.
    #[must_use]
    pub fn take_event(&self) -> Option<StackEvent> {
        self.events.try_receive().ok()
    }

    /// Waits until an inbound write is queued, without consuming it.
    pub async fn inbound_ready(&self) {
        self.inbound.ready_to_receive().await;
    }

    /// Returns the committed on/off value for `endpoint`.
    #[must_use]
    pub fn stored(&self, endpoint: EndpointId) -> Option<bool> {
        let index = table_index(endpoint)?;
        self.attributes
            .lock(|table| table.borrow().get(index).copied())
    }

    /// Returns `true` once a factory reset was requested and not yet serviced.
    #[must_use]
    pub fn reset_requested(&self) -> bool {
        self.reset_requested.load(Ordering::Acquire)
    }

    /// Timeout of the most recently opened commissioning window.
    #[must_use]
    pub fn window_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_timeout_s.load(Ordering::Acquire)))
    }

    fn commit(&self, endpoint: EndpointId, on: bool) -> bool {
        let Some(index) = table_index(endpoint) else {
            return false;
        };
        self.attributes.lock(|table| {
            match table.borrow_mut().get_mut(index) {
                Some(slot) => {
                    *slot = on;
                    true
                }
                None => false,
            }
        })
    }
}

impl Default for SharedStack {
    fn default() -> Self {
        Self::new()
    }
}

fn table_index(endpoint: EndpointId) -> Option<usize> {
    usize::from(endpoint).checked_sub(usize::from(FIRST_ENDPOINT))
}

/// Accessory-side view of a [`SharedStack`].
#[derive(Copy, Clone)]
pub struct StackHandle<'a> {
    shared: &'a SharedStack,
}

impl<'a> StackHandle<'a> {
    /// Returns the shared state with its full lifetime.
    #[must_use]
    pub fn shared(&self) -> &'a SharedStack {
        self.shared
    }
}

impl ProtocolStack for StackHandle<'_> {
    fn add_on_off_endpoint(&mut self, initial: bool) -> Result<EndpointId, StackError> {
        if self.shared.started.load(Ordering::Acquire) {
            return Err(StackError::Rejected);
        }
        let offset = self.shared.attributes.lock(|table| {
            let mut table = table.borrow_mut();
            let offset = table.len();
            table.push(initial).map(|()| offset)
        });
        let offset = offset.map_err(|_| StackError::Unavailable)?;
        let offset = u16::try_from(offset).map_err(|_| StackError::Unavailable)?;
        Ok(FIRST_ENDPOINT + offset)
    }

    fn start(&mut self) -> Result<(), StackError> {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(StackError::Busy);
        }
        if !self.is_commissioned() {
            self.shared.window_open.store(true, Ordering::Release);
            self.shared.publish(StackEvent::CommissioningWindowOpened);
        }
        Ok(())
    }

    fn is_commissioned(&self) -> bool {
        self.shared.commissioned.load(Ordering::Acquire)
    }

    fn is_network_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn is_commissioning_window_open(&self) -> bool {
        self.shared.window_open.load(Ordering::Acquire)
    }

    fn open_commissioning_window(&mut self, timeout: Duration) -> Result<(), StackError> {
        if !self.shared.started.load(Ordering::Acquire) {
            return Err(StackError::Unavailable);
        }
        let seconds = u32::try_from(timeout.as_secs()).map_err(|_| StackError::InvalidValue)?;
        self.shared.window_timeout_s.store(seconds, Ordering::Release);
        if !self.shared.window_open.swap(true, Ordering::AcqRel) {
            self.shared.publish(StackEvent::CommissioningWindowOpened);
        }
        Ok(())
    }

    fn factory_reset(&mut self) {
        self.shared.commissioned.store(false, Ordering::Release);
        self.shared.connected.store(false, Ordering::Release);
        self.shared.reset_requested.store(true, Ordering::Release);
        self.shared.inbound.clear();
    }

    fn get_attribute(&self, path: AttributePath) -> Result<AttributeValue, StackError> {
        if !path.is_on_off() {
            return Err(StackError::NotFound);
        }
        self.shared
            .stored(path.endpoint)
            .map(AttributeValue::Bool)
            .ok_or(StackError::NotFound)
    }

    fn set_attribute(
        &mut self,
        path: AttributePath,
        value: AttributeValue,
    ) -> Result<(), StackError> {
        self.shared.submit_write(AttributeWrite::new(path, value))
    }
}

impl InboundQueue for StackHandle<'_> {
    fn next_inbound(&mut self) -> Option<AttributeWrite> {
        self.shared.inbound.try_receive().ok()
    }

    fn finish_inbound(&mut self, write: AttributeWrite, accepted: bool) {
        if !accepted {
            return;
        }
        if let Some(on) = write.value.as_bool() {
            self.shared.commit(write.path.endpoint, on);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(endpoints: usize) -> SharedStack {
        let shared = SharedStack::new();
        let mut handle = shared.handle();
        for _ in 0..endpoints {
            handle.add_on_off_endpoint(true).unwrap();
        }
        handle.start().unwrap();
        shared
    }

    #[test]
    fn endpoints_are_numbered_from_one() {
        let shared = SharedStack::new();
        let mut handle = shared.handle();

        assert_eq!(handle.add_on_off_endpoint(true), Ok(1));
        assert_eq!(handle.add_on_off_endpoint(false), Ok(2));
        assert_eq!(shared.stored(1), Some(true));
        assert_eq!(shared.stored(2), Some(false));
        assert_eq!(shared.stored(0), None);

        handle.start().unwrap();
        assert_eq!(handle.add_on_off_endpoint(true), Err(StackError::Rejected));
    }

    #[test]
    fn table_capacity_is_enforced() {
        let shared = SharedStack::new();
        let mut handle = shared.handle();
        for _ in 0..MAX_ENDPOINTS {
            handle.add_on_off_endpoint(false).unwrap();
        }
        assert_eq!(
            handle.add_on_off_endpoint(false),
            Err(StackError::Unavailable)
        );
    }

    #[test]
    fn start_opens_window_when_uncommissioned() {
        let shared = started(1);
        let handle = shared.handle();

        assert!(handle.is_commissioning_window_open());
        assert_eq!(
            shared.take_event(),
            Some(StackEvent::CommissioningWindowOpened)
        );
        assert_eq!(shared.take_event(), None);
    }

    #[test]
    fn writes_wait_for_the_hook_before_commit() {
        let shared = started(2);
        let mut handle = shared.handle();

        handle
            .set_attribute(AttributePath::on_off(2), AttributeValue::Bool(false))
            .unwrap();
        assert_eq!(shared.stored(2), Some(true));

        let write = handle.next_inbound().unwrap();
        handle.finish_inbound(write, true);
        assert_eq!(shared.stored(2), Some(false));
        assert!(handle.next_inbound().is_none());
    }

    #[test]
    fn rejected_writes_are_dropped() {
        let shared = started(1);
        let mut handle = shared.handle();

        shared
            .submit_write(AttributeWrite::new(
                AttributePath::on_off(1),
                AttributeValue::Bool(false),
            ))
            .unwrap();
        let write = handle.next_inbound().unwrap();
        handle.finish_inbound(write, false);

        assert_eq!(shared.stored(1), Some(true));
    }

    #[test]
    fn writes_to_unknown_paths_are_refused() {
        let shared = started(1);

        let unknown = AttributeWrite::new(AttributePath::on_off(5), AttributeValue::Bool(true));
        let level = AttributeWrite::new(AttributePath::new(1, 0x0008, 0), AttributeValue::U8(3));

        assert_eq!(shared.submit_write(unknown), Err(StackError::NotFound));
        assert_eq!(shared.submit_write(level), Err(StackError::NotFound));
    }

    #[test]
    fn full_inbound_queue_reports_busy() {
        let shared = started(1);
        let write = AttributeWrite::new(AttributePath::on_off(1), AttributeValue::Bool(true));

        for _ in 0..INBOUND_QUEUE_DEPTH {
            shared.submit_write(write).unwrap();
        }
        assert_eq!(shared.submit_write(write), Err(StackError::Busy));
    }

    #[test]
    fn writes_before_start_are_unavailable() {
        let shared = SharedStack::new();
        shared.handle().add_on_off_endpoint(true).unwrap();

        let write = AttributeWrite::new(AttributePath::on_off(1), AttributeValue::Bool(true));
        assert_eq!(shared.submit_write(write), Err(StackError::Unavailable));
    }

    #[test]
    fn commissioning_closes_window_and_publishes() {
        let shared = started(1);
        let handle = shared.handle();
        while shared.take_event().is_some() {}

        shared.set_commissioned(true);
        shared.set_network_connected(true);

        assert!(handle.is_commissioned());
        assert!(handle.is_network_connected());
        assert!(!handle.is_commissioning_window_open());
        assert_eq!(shared.take_event(), Some(StackEvent::CommissioningComplete));
        assert_eq!(
            shared.take_event(),
            Some(StackEvent::CommissioningWindowClosed)
        );
        assert_eq!(
            shared.take_event(),
            Some(StackEvent::InterfaceAddressChanged { ipv6: true })
        );
    }

    #[test]
    fn fabric_removal_and_window_reopen() {
        let shared = started(1);
        let mut handle = shared.handle();
        shared.set_commissioned(true);
        while shared.take_event().is_some() {}

        shared.remove_fabric();
        assert!(!handle.is_commissioned());
        assert_eq!(shared.take_event(), Some(StackEvent::FabricWillBeRemoved));
        assert_eq!(shared.take_event(), Some(StackEvent::FabricRemoved));

        handle
            .open_commissioning_window(Duration::from_secs(300))
            .unwrap();
        assert!(handle.is_commissioning_window_open());
        assert_eq!(shared.window_timeout(), Duration::from_secs(300));
        assert_eq!(
            shared.take_event(),
            Some(StackEvent::CommissioningWindowOpened)
        );
    }

    #[test]
    fn factory_reset_flags_reboot_and_drops_pending_writes() {
        let shared = started(1);
        let mut handle = shared.handle();
        shared.set_commissioned(true);
        shared.set_network_connected(true);
        shared
            .submit_write(AttributeWrite::new(
                AttributePath::on_off(1),
                AttributeValue::Bool(false),
            ))
            .unwrap();

        handle.factory_reset();

        assert!(shared.reset_requested());
        assert!(!handle.is_commissioned());
        assert!(!handle.is_network_connected());
        assert!(handle.next_inbound().is_none());
    }
}
