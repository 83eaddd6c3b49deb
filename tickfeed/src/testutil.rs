//! Host-side stand-in for the counter peripheral, used by the unit tests in
//! place of real hardware.

use core::cell::Cell;

use critical_section::Mutex;
use tickfeed_util::{Error, Result};

use crate::counter::{CounterApi, CounterId, CounterSettings, CounterWidth};

/// A counter whose time only moves when the test says so. `read_now` can
/// optionally auto-advance to emulate a free-running counter for busy-wait
/// tests.
pub(crate) struct MockCounter {
    width: CounterWidth,
    now: Mutex<Cell<u32>>,
    /// Ticks added per `read_now` call.
    step: Mutex<Cell<u32>>,
    reads: Mutex<Cell<u32>>,
    compare: Mutex<Cell<u32>>,
    running: Mutex<Cell<bool>>,
    /// Set by `trigger_compare_interrupt`, cleared by `take_pended`.
    pended: Mutex<Cell<bool>>,
    fail_configure: Mutex<Cell<bool>>,
    settings: Mutex<Cell<Option<CounterSettings>>>,
}

impl MockCounter {
    pub(crate) const fn new(width: CounterWidth) -> Self {
        Self {
            width,
            now: Mutex::new(Cell::new(0)),
            step: Mutex::new(Cell::new(0)),
            reads: Mutex::new(Cell::new(0)),
            compare: Mutex::new(Cell::new(0)),
            running: Mutex::new(Cell::new(false)),
            pended: Mutex::new(Cell::new(false)),
            fail_configure: Mutex::new(Cell::new(false)),
            settings: Mutex::new(Cell::new(None)),
        }
    }

    pub(crate) fn set_now(&self, now: u32) {
        critical_section::with(|cs| self.now.borrow(cs).set(now & self.width.mask()));
    }

    pub(crate) fn advance(&self, ticks: u32) {
        critical_section::with(|cs| {
            let now = self.now.borrow(cs);
            now.set(now.get().wrapping_add(ticks) & self.width.mask());
        });
    }

    /// Advance the counter by `step` ticks on every `read_now`.
    pub(crate) fn auto_advance(&self, step: u32) {
        critical_section::with(|cs| self.step.borrow(cs).set(step));
    }

    pub(crate) fn reads(&self) -> u32 {
        critical_section::with(|cs| self.reads.borrow(cs).get())
    }

    pub(crate) fn compare(&self) -> u32 {
        critical_section::with(|cs| self.compare.borrow(cs).get())
    }

    pub(crate) fn take_pended(&self) -> bool {
        critical_section::with(|cs| self.pended.borrow(cs).replace(false))
    }

    pub(crate) fn fail_configure(&self, fail: bool) {
        critical_section::with(|cs| self.fail_configure.borrow(cs).set(fail));
    }

    pub(crate) fn settings(&self) -> Option<CounterSettings> {
        critical_section::with(|cs| self.settings.borrow(cs).get())
    }
}

impl CounterApi for MockCounter {
    fn id(&self) -> CounterId {
        CounterId::new(self as *const Self as usize)
    }

    fn configure(&self, settings: CounterSettings) -> Result<u32> {
        critical_section::with(|cs| {
            if self.fail_configure.borrow(cs).get() {
                return Err(Error);
            }
            self.settings.borrow(cs).set(Some(settings));
            Ok(settings.prescaler)
        })
    }

    fn read_now(&self) -> u32 {
        critical_section::with(|cs| {
            let reads = self.reads.borrow(cs);
            reads.set(reads.get().wrapping_add(1));
            let now = self.now.borrow(cs);
            let value = now.get();
            let step = self.step.borrow(cs).get();
            if step > 0 {
                now.set(value.wrapping_add(step) & self.width.mask());
            }
            value
        })
    }

    fn set_compare(&self, value: u32) {
        critical_section::with(|cs| self.compare.borrow(cs).set(value & self.width.mask()));
    }

    fn is_running(&self) -> bool {
        critical_section::with(|cs| self.running.borrow(cs).get())
    }

    fn start(&self) -> Result<()> {
        critical_section::with(|cs| self.running.borrow(cs).set(true));
        Ok(())
    }

    fn stop(&self) {
        critical_section::with(|cs| self.running.borrow(cs).set(false));
    }

    fn trigger_compare_interrupt(&self) {
        critical_section::with(|cs| self.pended.borrow(cs).set(true));
    }
}
