//! Single-slot handoff of a pending scheduler operation from the foreground
//! to the compare ISR.
//!
//! The tag is the synchronization anchor: a byte-wide atomic written by the
//! foreground with release ordering after the operand cells, and swapped out
//! by the ISR with acquire ordering before it reads them. A second request
//! posted before the ISR consumed the first overwrites it, last write wins;
//! well-formed callers issue one request per critical section.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use tickfeed_util::warn;

use crate::timer::Timer;

const TAG_NONE: u8 = 0;
const TAG_ATTACH: u8 = 1;
const TAG_DETACH: u8 = 2;
const TAG_CHANGE_DELAY: u8 = 3;
const TAG_ATTACH_IN_SYNC: u8 = 4;
const TAG_MANUAL_FIRE: u8 = 5;

/// A pending scheduler operation together with its operands.
#[derive(Clone, Copy)]
pub(crate) enum Op<'a> {
    Attach(&'a Timer<'a>),
    Detach(&'a Timer<'a>),
    ChangeDelay(&'a Timer<'a>, u32),
    AttachInSync(&'a Timer<'a>, &'a Timer<'a>),
    ManualFire(&'a Timer<'a>),
}

pub(crate) struct Mailbox<'a> {
    tag: AtomicU8,
    timer: Mutex<Cell<Option<&'a Timer<'a>>>>,
    reference: Mutex<Cell<Option<&'a Timer<'a>>>>,
    delay: Mutex<Cell<u32>>,
    tick_in_progress: AtomicBool,
}

impl<'a> Mailbox<'a> {
    pub(crate) const fn new() -> Self {
        Self {
            tag: AtomicU8::new(TAG_NONE),
            timer: Mutex::new(Cell::new(None)),
            reference: Mutex::new(Cell::new(None)),
            delay: Mutex::new(Cell::new(0)),
            tick_in_progress: AtomicBool::new(false),
        }
    }

    /// Publishes `op` for the ISR. Overwrites a still-pending request.
    pub(crate) fn post(&self, op: Op<'a>) {
        let tag = critical_section::with(|cs| {
            let (tag, timer, reference, delay) = match op {
                Op::Attach(t) => (TAG_ATTACH, t, None, 0),
                Op::Detach(t) => (TAG_DETACH, t, None, 0),
                Op::ChangeDelay(t, d) => (TAG_CHANGE_DELAY, t, None, d),
                Op::AttachInSync(t, r) => (TAG_ATTACH_IN_SYNC, t, Some(r), 0),
                Op::ManualFire(t) => (TAG_MANUAL_FIRE, t, None, 0),
            };
            self.timer.borrow(cs).set(Some(timer));
            self.reference.borrow(cs).set(reference);
            self.delay.borrow(cs).set(delay);
            tag
        });
        let previous = self.tag.swap(tag, Ordering::Release);
        if previous != TAG_NONE {
            warn!("pending scheduler request overwritten");
        }
    }

    /// Consumes the pending request, if any. Called by the ISR at the start
    /// of each tick.
    pub(crate) fn take(&self, cs: CriticalSection) -> Option<Op<'a>> {
        let tag = self.tag.swap(TAG_NONE, Ordering::Acquire);
        if tag == TAG_NONE {
            return None;
        }
        let timer = self.timer.borrow(cs).take()?;
        let reference = self.reference.borrow(cs).take();
        let delay = self.delay.borrow(cs).get();
        match tag {
            TAG_ATTACH => Some(Op::Attach(timer)),
            TAG_DETACH => Some(Op::Detach(timer)),
            TAG_CHANGE_DELAY => Some(Op::ChangeDelay(timer, delay)),
            TAG_ATTACH_IN_SYNC => reference.map(|r| Op::AttachInSync(timer, r)),
            TAG_MANUAL_FIRE => Some(Op::ManualFire(timer)),
            _ => None,
        }
    }

    /// Whether the ISR is currently servicing a tick. Written by the ISR
    /// only; read by the foreground to decide the request routing.
    pub(crate) fn tick_in_progress(&self) -> bool {
        self.tick_in_progress.load(Ordering::Acquire)
    }

    pub(crate) fn set_tick_in_progress(&self, in_progress: bool) {
        self.tick_in_progress.store(in_progress, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn starts_empty() {
        let mailbox = Mailbox::new();
        assert!(critical_section::with(|cs| mailbox.take(cs)).is_none());
        assert!(!mailbox.tick_in_progress());
    }

    #[test]
    fn post_take_roundtrip() {
        let timer = Timer::new(10, false, noop);
        let mailbox = Mailbox::new();
        mailbox.post(Op::ChangeDelay(&timer, 42));
        let op = critical_section::with(|cs| mailbox.take(cs)).unwrap();
        match op {
            Op::ChangeDelay(t, d) => {
                assert!(core::ptr::eq(t, &timer));
                assert_eq!(d, 42);
            }
            _ => panic!("wrong operation"),
        }
        // The slot is consumed.
        assert!(critical_section::with(|cs| mailbox.take(cs)).is_none());
    }

    #[test]
    fn last_write_wins() {
        let first = Timer::new(10, false, noop);
        let second = Timer::new(20, false, noop);
        let mailbox = Mailbox::new();
        mailbox.post(Op::Attach(&first));
        mailbox.post(Op::Detach(&second));
        let op = critical_section::with(|cs| mailbox.take(cs)).unwrap();
        assert!(matches!(op, Op::Detach(t) if core::ptr::eq(t, &second)));
        assert!(critical_section::with(|cs| mailbox.take(cs)).is_none());
    }

    #[test]
    fn in_sync_carries_reference() {
        let timer = Timer::new(10, false, noop);
        let reference = Timer::new(30, true, noop);
        let mailbox = Mailbox::new();
        mailbox.post(Op::AttachInSync(&timer, &reference));
        let op = critical_section::with(|cs| mailbox.take(cs)).unwrap();
        assert!(
            matches!(op, Op::AttachInSync(t, r) if core::ptr::eq(t, &timer) && core::ptr::eq(r, &reference))
        );
    }
}
