//! [`CounterApi`] on the nRF52840 TIMER0 peripheral.

use core::cell::Cell;

use critical_section::Mutex;
use nrf52840_hal::pac::{self, interrupt, TIMER0};
use tickfeed_util::Result;

use crate::chain;
use crate::counter::{CounterApi, CounterId, CounterSettings, CounterWidth};

/// Largest prescaler exponent the TIMER supports (division by 2^9).
const MAX_PRESCALER_EXP: u32 = 9;

/// The TIMER counts a 16 MHz base clock divided by a power of two, so
/// [`CounterApi::configure`] rounds the requested division down to the
/// nearest power of two and reports the division actually in effect.
///
/// CC\[0\] is the compare channel; CC\[1\] is reserved for capturing the
/// counter on [`CounterApi::read_now`].
pub struct NrfCounter {
    running: Mutex<Cell<bool>>,
}

impl NrfCounter {
    /// Takes the peripheral as proof of unique ownership; register access
    /// happens through the stolen handle afterwards.
    pub fn new(_timer: TIMER0) -> Self {
        Self {
            running: Mutex::new(Cell::new(false)),
        }
    }

    fn timer() -> TIMER0 {
        // Safety: clients proved unique ownership of the peripheral by
        //         passing an instance into the constructor.
        unsafe { pac::Peripherals::steal() }.TIMER0
    }
}

impl CounterApi for NrfCounter {
    fn id(&self) -> CounterId {
        CounterId::new(TIMER0::ptr() as usize)
    }

    fn configure(&self, settings: CounterSettings) -> Result<u32> {
        let timer = Self::timer();
        timer.tasks_stop.write(|w| unsafe { w.bits(1) });
        timer.mode.write(|w| w.mode().timer());
        timer.bitmode.write(|w| match settings.width {
            CounterWidth::W16 => w.bitmode()._16bit(),
            CounterWidth::W32 => w.bitmode()._32bit(),
        });

        let exponent = (31 - settings.prescaler.max(1).leading_zeros()).min(MAX_PRESCALER_EXP);
        timer
            .prescaler
            .write(|w| unsafe { w.prescaler().bits(exponent as u8) });

        timer.intenclr.write(|w| w.compare0().set_bit());
        timer.events_compare[0].write(|w| unsafe { w.bits(0) });
        timer.tasks_clear.write(|w| unsafe { w.bits(1) });
        Ok(1 << exponent)
    }

    fn read_now(&self) -> u32 {
        // The TIMER counter is not memory mapped; it has to be captured
        // into a CC register first.
        let timer = Self::timer();
        timer.tasks_capture[1].write(|w| unsafe { w.bits(1) });
        timer.cc[1].read().bits()
    }

    fn set_compare(&self, value: u32) {
        Self::timer().cc[0].write(|w| unsafe { w.bits(value) });
    }

    fn is_running(&self) -> bool {
        critical_section::with(|cs| self.running.borrow(cs).get())
    }

    fn start(&self) -> Result<()> {
        let timer = Self::timer();
        timer.events_compare[0].write(|w| unsafe { w.bits(0) });
        timer.intenset.write(|w| w.compare0().set_bit());
        pac::NVIC::unpend(pac::Interrupt::TIMER0);
        // Safety: the compare interrupt was kept disabled at the peripheral
        //         up to this point, so no event can predate the handler
        //         setup.
        unsafe { pac::NVIC::unmask(pac::Interrupt::TIMER0) };
        timer.tasks_start.write(|w| unsafe { w.bits(1) });
        critical_section::with(|cs| self.running.borrow(cs).set(true));
        Ok(())
    }

    fn stop(&self) {
        let timer = Self::timer();
        timer.intenclr.write(|w| w.compare0().set_bit());
        timer.tasks_stop.write(|w| unsafe { w.bits(1) });
        critical_section::with(|cs| self.running.borrow(cs).set(false));
    }

    fn trigger_compare_interrupt(&self) {
        pac::NVIC::pend(pac::Interrupt::TIMER0);
    }
}

#[interrupt]
fn TIMER0() {
    // Clear the compare event before dispatching; the scheduler reprograms
    // CC[0] while servicing the tick. Synthesized interrupts arrive with no
    // event set.
    let timer = NrfCounter::timer();
    if timer.events_compare[0].read().bits() != 0 {
        timer.events_compare[0].write(|w| unsafe { w.bits(0) });
    }
    chain::dispatch(CounterId::new(pac::TIMER0::ptr() as usize));
}
