#![no_std]

//! Shared board bring-up for the nRF52840-DK demos.

use nrf52840_hal::pac::{self, Peripherals};
use tickfeed::socs::nrf::NrfCounter;
use tickfeed::{CounterWidth, TickControl};

/// LED1 on the nRF52840-DK, active low.
pub const PIN_LED1: u32 = 13;
/// LED2 on the nRF52840-DK, active low.
pub const PIN_LED2: u32 = 14;
/// Button1 on the nRF52840-DK, active low.
pub const PIN_BUTTON1: u32 = 11;

/// TIMER0 base clock in Hz.
pub const TIMER_INPUT_FREQUENCY: u32 = 16_000_000;
/// Power-of-two division so the TIMER prescaler hits it exactly; yields a
/// 15625 Hz tick.
pub const FREQUENCY_DIVISION: u32 = 1_024;
/// Ticks per second at the resulting tick frequency.
pub const TICKS_PER_SECOND: u32 = TIMER_INPUT_FREQUENCY / FREQUENCY_DIVISION;

/// Takes the peripherals and prepares LEDs, the button and the counter.
pub fn config_board() -> TickControl<'static, NrfCounter> {
    let peripherals = Peripherals::take().unwrap();

    let p0 = &peripherals.P0;
    for pin in [PIN_LED1, PIN_LED2] {
        p0.outset.write(|w| unsafe { w.bits(1 << pin) });
        p0.pin_cnf[pin as usize].write(|w| w.dir().output());
    }
    p0.pin_cnf[PIN_BUTTON1 as usize].write(|w| {
        w.dir().input();
        w.input().connect();
        w.pull().pullup()
    });

    TickControl::new(
        NrfCounter::new(peripherals.TIMER0),
        TIMER_INPUT_FREQUENCY,
        FREQUENCY_DIVISION,
        CounterWidth::W16,
    )
}

fn p0() -> &'static pac::p0::RegisterBlock {
    // Safety: only pin set/clear/read accesses below, all of them
    //         single-register and single-writer per pin.
    unsafe { &*pac::P0::ptr() }
}

pub fn led_on(pin: u32) {
    p0().outclr.write(|w| unsafe { w.bits(1 << pin) });
}

pub fn led_off(pin: u32) {
    p0().outset.write(|w| unsafe { w.bits(1 << pin) });
}

pub fn toggle_led(pin: u32) {
    let out = p0().out.read().bits();
    p0().out.write(|w| unsafe { w.bits(out ^ (1 << pin)) });
}

pub fn button_pushed() -> bool {
    p0().in_.read().bits() & (1 << PIN_BUTTON1) == 0
}
