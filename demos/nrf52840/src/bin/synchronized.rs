#![no_std]
#![no_main]

//! Flashes LED1 periodically; a button push schedules a single LED2 flash
//! that fires in phase with the LED1 pattern, no matter when the button was
//! pushed.

use cortex_m_rt::entry;
use panic_probe as _;

use static_cell::StaticCell;
use tickfeed::socs::nrf::NrfCounter;
use tickfeed::{ContextCallback, TickControl, Timer};
use tickfeed_demos_nrf52840::{
    button_pushed, config_board, led_off, led_on, PIN_LED1, PIN_LED2, TICKS_PER_SECOND,
};

type Control = TickControl<'static, NrfCounter>;

static CONTROL: StaticCell<Control> = StaticCell::new();
static FLASH_FAST: StaticCell<ContextCallback<&'static Control>> = StaticCell::new();
static FLASH_SLOW: StaticCell<ContextCallback<&'static Control>> = StaticCell::new();
static T_FAST: StaticCell<Timer<'static>> = StaticCell::new();
static T_SLOW: StaticCell<Timer<'static>> = StaticCell::new();

fn fast_off() {
    led_off(PIN_LED1);
}

fn slow_off() {
    led_off(PIN_LED2);
}

// One-shot off timers, re-attached from the flash callbacks.
static T_FAST_OFF: Timer<'static> = Timer::new(TICKS_PER_SECOND / 20, false, fast_off);
static T_SLOW_OFF: Timer<'static> = Timer::new(TICKS_PER_SECOND / 2, false, slow_off);

#[entry]
fn main() -> ! {
    let control = CONTROL.init(config_board());
    control.register();

    // Flash timers attach their off timer from inside the tick, which is
    // always routed directly and keeps the flash length exact.
    let flash_fast = FLASH_FAST.init(ContextCallback::new(
        &*control,
        |control: &&'static Control| {
            led_on(PIN_LED1);
            control.attach(&T_FAST_OFF);
        },
    ));
    let t_fast = T_FAST.init(Timer::with_handler(TICKS_PER_SECOND, true, flash_fast));

    let flash_slow = FLASH_SLOW.init(ContextCallback::new(
        &*control,
        |control: &&'static Control| {
            led_on(PIN_LED2);
            control.attach(&T_SLOW_OFF);
        },
    ));
    let t_slow = T_SLOW.init(Timer::with_handler(TICKS_PER_SECOND, false, flash_slow));

    control.begin().unwrap();
    control.attach(t_fast);

    let mut previous = false;
    loop {
        let pushed = button_pushed();
        if !previous && pushed && !t_slow.is_attached() {
            // Attach in sync: LED2 flashes as if its timer had been started
            // together with the LED1 pattern.
            control.attach_in_sync(t_slow, t_fast);
            // Debouncing delay for the button.
            control.sleep(TICKS_PER_SECOND as u64 / 100);
        }
        previous = pushed;
    }
}
