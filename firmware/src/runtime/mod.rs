use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use static_cell::StaticCell;

use accessory_core::accessory::RELAY_COUNT;
use accessory_core::{AccessoryConfig, AccessoryStateMachine};

use crate::hw::BoardIo;
use crate::stack::{SharedStack, StackHandle};

mod accessory_task;

/// Accessory state machine wired to the board and the shared stack.
pub type FirmwareAccessory =
    AccessoryStateMachine<StackHandle<'static>, BoardIo<'static>, RELAY_COUNT>;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

static SHARED_STACK: StaticCell<SharedStack> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PC13,
        TIM3,
        ..
    } = hal::init(config);

    let relays = [
        Output::new(PA4, Level::Low, Speed::Low),
        Output::new(PA3, Level::Low, Speed::Low),
        Output::new(PA2, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
    ];
    let button = Input::new(PC13, Pull::Up);
    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        None,
        None,
        None,
        khz(1),
        CountingMode::EdgeAlignedUp,
    );
    let io = BoardIo::new(relays, button, pwm.split().ch1);

    let shared: &'static SharedStack = SHARED_STACK.init(SharedStack::new());
    let accessory =
        match AccessoryStateMachine::initialize(shared.handle(), io, AccessoryConfig::default()) {
            Ok(accessory) => accessory,
            Err(error) => {
                defmt::error!("accessory init failed: {}", defmt::Display2Format(&error));
                core::future::pending::<()>().await;
                return;
            }
        };
    defmt::info!("accessory started with {} relays", RELAY_COUNT);

    spawner
        .spawn(accessory_task::run(accessory))
        .expect("failed to spawn accessory task");

    core::future::pending::<()>().await;
}
