mod support;

use std::time::Duration;

use accessory_core::accessory::Phase;
use accessory_core::button::ButtonEvent;
use accessory_core::error::AccessoryError;
use accessory_core::relay::RelayId;
use accessory_core::stack::StackError;
use accessory_core::telemetry::TelemetryEventKind;

use support::{accessory, count_events, press, ready_accessory, release, run_for, tick};

#[test]
fn holding_eleven_seconds_triggers_one_factory_reset() {
    let mut accessory = ready_accessory();

    press(&mut accessory);
    let held = run_for(&mut accessory, Duration::from_secs(11));
    assert_eq!(held[0].button, Some(ButtonEvent::Pressed));
    assert!(held.iter().all(|report| !report.factory_reset));
    // The press toggled relay 0 right away.
    assert!(!accessory.bridge().relays()[0].current_state());

    release(&mut accessory);
    let after = run_for(&mut accessory, Duration::from_millis(500));

    assert_eq!(after.iter().filter(|report| report.factory_reset).count(), 1);
    assert_eq!(accessory.stack().factory_resets, 1);
    assert_eq!(
        after.iter().find_map(|report| report.button),
        Some(ButtonEvent::LongRelease(Duration::from_millis(11_100)))
    );
    assert_eq!(after.last().map(|report| report.phase), Some(Phase::Commissioning));
    assert_eq!(
        count_events(&accessory, |event| *event == TelemetryEventKind::FactoryResetRequested),
        1
    );
}

#[test]
fn exactly_ten_seconds_is_a_short_release() {
    let mut accessory = ready_accessory();

    press(&mut accessory);
    run_for(&mut accessory, Duration::from_millis(9_900));
    release(&mut accessory);
    let after = run_for(&mut accessory, Duration::from_millis(300));

    assert_eq!(
        after.iter().find_map(|report| report.button),
        Some(ButtonEvent::ShortRelease(Duration::from_millis(10_000)))
    );
    assert_eq!(accessory.stack().factory_resets, 0);
}

#[test]
fn ten_seconds_and_one_tick_is_long() {
    let mut accessory = ready_accessory();

    press(&mut accessory);
    run_for(&mut accessory, Duration::from_millis(9_950));
    release(&mut accessory);
    let after = run_for(&mut accessory, Duration::from_millis(300));

    assert_eq!(
        after.iter().find_map(|report| report.button),
        Some(ButtonEvent::LongRelease(Duration::from_millis(10_050)))
    );
    assert_eq!(accessory.stack().factory_resets, 1);
}

#[test]
fn short_press_toggles_relay_zero_only() {
    let mut accessory = ready_accessory();

    press(&mut accessory);
    let report = tick(&mut accessory);
    assert_eq!(report.button, Some(ButtonEvent::Pressed));
    release(&mut accessory);
    let after = run_for(&mut accessory, Duration::from_millis(300));
    assert!(matches!(
        after.iter().find_map(|report| report.button),
        Some(ButtonEvent::ShortRelease(_))
    ));

    let relays = accessory.bridge().relays();
    assert!(!relays[0].current_state());
    assert!(relays[1..].iter().all(|relay| relay.current_state()));
    assert_eq!(accessory.stack().stored(1), Some(false));
    assert_eq!(accessory.stack().factory_resets, 0);

    press(&mut accessory);
    tick(&mut accessory);
    assert!(accessory.bridge().relays()[0].current_state());
    assert_eq!(accessory.stack().stored(1), Some(true));
}

#[test]
fn long_press_resets_even_while_commissioning() {
    let mut accessory = accessory();

    press(&mut accessory);
    run_for(&mut accessory, Duration::from_secs(12));
    release(&mut accessory);
    run_for(&mut accessory, Duration::from_millis(200));

    assert_eq!(accessory.stack().factory_resets, 1);
}

#[test]
fn failed_toggle_is_recorded() {
    let mut accessory = ready_accessory();
    accessory.stack_mut().fail_reads = true;

    press(&mut accessory);
    let report = tick(&mut accessory);

    assert_eq!(report.button, Some(ButtonEvent::Pressed));
    assert_eq!(
        count_events(&accessory, |event| *event
            == TelemetryEventKind::ToggleFailed {
                relay: RelayId(0),
                error: AccessoryError::Protocol(StackError::Busy),
            }),
        1
    );
    assert!(accessory.bridge().relays()[0].current_state());
}
