#![no_std]
#![no_main]

//! Toggles LED1 twice a second from a single periodic timer.

use cortex_m_rt::entry;
use panic_probe as _;

use static_cell::StaticCell;
use tickfeed::socs::nrf::NrfCounter;
use tickfeed::{TickControl, Timer};
use tickfeed_demos_nrf52840::{config_board, toggle_led, PIN_LED1, TICKS_PER_SECOND};

static CONTROL: StaticCell<TickControl<'static, NrfCounter>> = StaticCell::new();

fn blink() {
    toggle_led(PIN_LED1);
}

// Half a second toggle, i.e. 1 Hz blinking.
static T_TOGGLE: Timer<'static> = Timer::new(TICKS_PER_SECOND / 2, true, blink);

#[entry]
fn main() -> ! {
    let control = CONTROL.init(config_board());
    control.register();

    control.begin().unwrap();
    control.attach(&T_TOGGLE);

    // The timer callback is set, interrupts handle everything.
    loop {
        cortex_m::asm::wfi();
    }
}
