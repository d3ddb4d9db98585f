use accessory_core::accessory::TICK_INTERVAL;
use cortex_m::peripheral::SCB;
use embassy_futures::select::{Either, select};
use embassy_time::{Ticker, Timer};

use super::FirmwareAccessory;
use crate::clock::embassy_duration;
use crate::telemetry::TelemetryLog;

#[embassy_executor::task]
pub async fn run(mut accessory: FirmwareAccessory) -> ! {
    let shared = accessory.stack().shared();
    let mut ticker = Ticker::every(embassy_duration(TICK_INTERVAL));
    let mut log = TelemetryLog::new();

    loop {
        // Inbound writes are serviced as soon as they arrive; the state
        // machine itself only advances on the tick.
        if let Either::First(()) = select(ticker.next(), shared.inbound_ready()).await {
            while let Some(event) = shared.take_event() {
                accessory.on_stack_event(event);
            }
            accessory.advance();
        }
        accessory.drain_inbound();
        log.flush(accessory.telemetry());

        if shared.reset_requested() {
            // Give RTT a moment to drain the reset log.
            Timer::after_millis(100).await;
            SCB::sys_reset();
        }
    }
}
