//! The scheduler servicing the compare interrupt.
//!
//! [`TickControl`] owns the counter peripheral, the timer feed and the
//! request mailbox. Public mutations are routed one of two ways:
//!
//! - counter stopped, or the call comes from inside [`TickControl::tick`]
//!   (a callback): the feed is mutated directly against a fresh counter
//!   snapshot;
//! - counter running: the request is published in the mailbox and a compare
//!   interrupt is synthesized, so the mutation happens in interrupt context.
//!   The call returns without waiting.
//!
//! `tick()` first consumes the mailbox, then drains expired records off the
//! head of the feed, reinserting periodic ones at `target + delay` before
//! their callback runs. Callbacks therefore observe the feed in its
//! post-reschedule state and may freely attach, detach or retarget any
//! timer, including their own.

use core::cell::Cell;

use critical_section::Mutex;
use tickfeed_util::{debug, Result};

use crate::chain::{self, ChainLink, CompareHook};
use crate::counter::{CounterApi, CounterId, CounterSettings, CounterWidth, MAX_PRESCALE};
use crate::feed::TimerFeed;
use crate::mailbox::{Mailbox, Op};
use crate::timer::Timer;

/// Modular window behind `now` within which a deadline counts as already
/// due. Treating "due very soon" like "due" keeps a late interrupt from
/// rescheduling the head into the far future.
pub const CALLBACK_JITTER: u32 = 1000;

const fn clamp_prescale(division: u32) -> u32 {
    if division == 0 {
        1
    } else if division > MAX_PRESCALE {
        MAX_PRESCALE
    } else {
        division
    }
}

/// Multiplexes logical [`Timer`]s onto one hardware capture/compare channel.
///
/// The control never owns the timer records it schedules; it links the
/// application's records into its feed and unlinks them again on detach or
/// one-shot expiry.
pub struct TickControl<'a, C: CounterApi> {
    counter: C,
    input_frequency: u32,
    clock_division: u32,
    width: CounterWidth,
    /// Prescaler in effect, refreshed with the hardware's report on
    /// [`TickControl::begin`].
    prescaler: Mutex<Cell<u32>>,
    feed: TimerFeed<'a>,
    mailbox: Mailbox<'a>,
    link: ChainLink,
}

impl<'a, C: CounterApi> TickControl<'a, C> {
    /// A control driving `counter`, whose input clock of `input_frequency`
    /// Hz is divided by `clock_division` (clamped to
    /// [`MAX_PRESCALE`](crate::MAX_PRESCALE)) to form the tick.
    pub const fn new(
        counter: C,
        input_frequency: u32,
        clock_division: u32,
        width: CounterWidth,
    ) -> Self {
        Self {
            counter,
            input_frequency,
            clock_division,
            width,
            prescaler: Mutex::new(Cell::new(clamp_prescale(clock_division))),
            feed: TimerFeed::new(width.mask()),
            mailbox: Mailbox::new(),
            link: ChainLink::new(),
        }
    }

    /// The counter peripheral driven by this control.
    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn input_frequency(&self) -> u32 {
        self.input_frequency
    }

    pub fn clock_division(&self) -> u32 {
        self.clock_division
    }

    pub fn width(&self) -> CounterWidth {
        self.width
    }

    /// The tick frequency in effect: input frequency over the effective
    /// prescaler.
    pub fn actual_tick_frequency(&self) -> f32 {
        let prescaler = critical_section::with(|cs| self.prescaler.borrow(cs).get());
        self.input_frequency as f32 / prescaler as f32
    }

    pub fn is_running(&self) -> bool {
        self.counter.is_running()
    }

    fn mask(&self) -> u32 {
        self.feed.mask()
    }

    /// Configures and starts the counter, arming the compare channel for the
    /// earliest attached deadline (or the maximum delay when the feed is
    /// empty). Hardware failures surface here; no partial state remains.
    pub fn begin(&self) -> Result<()> {
        let effective = self.counter.configure(CounterSettings {
            prescaler: clamp_prescale(self.clock_division),
            width: self.width,
        })?;
        critical_section::with(|cs| {
            self.prescaler.borrow(cs).set(effective);
            let compare = match self.feed.head(cs) {
                Some(head) => head.target(cs),
                None => self.feed.mask(),
            };
            self.counter.set_compare(compare);
        });
        self.counter.start()?;
        debug!("tick control started");
        Ok(())
    }

    /// Stops the counter and its interrupt generation. Attached timers stay
    /// attached and resume on the next [`TickControl::begin`].
    pub fn stop(&self) {
        self.counter.stop();
        debug!("tick control stopped");
    }

    /// Schedules `timer` to fire `timer.delay()` ticks from now. No-op if it
    /// is already attached.
    pub fn attach(&self, timer: &'a Timer<'a>) {
        self.route(Op::Attach(timer));
    }

    /// Removes `timer` from the schedule. No-op if it is not attached.
    pub fn detach(&self, timer: &'a Timer<'a>) {
        self.route(Op::Detach(timer));
    }

    /// Changes the delay of `timer` without restarting it: the firing phase
    /// relative to the timer's virtual start is preserved. When the new
    /// delay is already exceeded the timer fires immediately instead and
    /// restarts from now. No-op if `delay` is zero.
    pub fn change_delay(&self, timer: &'a Timer<'a>, delay: u32) {
        if delay == 0 {
            return;
        }
        self.route(Op::ChangeDelay(timer, delay));
    }

    /// Attaches `timer` as if it had been attached in the same tick
    /// `reference` was started in: the first firing is the earliest future
    /// tick aligned to `reference`'s virtual start modulo `timer.delay()`.
    /// `reference` may itself already be detached. No-op if `timer` is
    /// already attached.
    pub fn attach_in_sync(&self, timer: &'a Timer<'a>, reference: &'a Timer<'a>) {
        self.route(Op::AttachInSync(timer, reference));
    }

    /// Fires `timer` now, independent of the counter. A periodic timer is
    /// (re)attached to fire `timer.delay()` ticks from now afterwards; an
    /// attached one-shot is detached.
    pub fn manual_fire(&self, timer: &'a Timer<'a>) {
        self.route(Op::ManualFire(timer));
    }

    /// Ticks until `timer` fires next, or 0 if it is not attached.
    pub fn remaining_ticks(&self, timer: &Timer<'a>) -> u32 {
        critical_section::with(|cs| {
            if timer.attached(cs) {
                self.feed.dist(timer.target(cs), self.counter.read_now())
            } else {
                0
            }
        })
    }

    /// Ticks since `timer`'s current period began, or 0 if it is not
    /// attached.
    pub fn elapsed_ticks(&self, timer: &Timer<'a>) -> u32 {
        critical_section::with(|cs| {
            if timer.attached(cs) {
                let remaining = self.feed.dist(timer.target(cs), self.counter.read_now());
                timer.delay_ticks(cs).wrapping_sub(remaining) & self.mask()
            } else {
                0
            }
        })
    }

    /// Busy-waits for `ticks` counter ticks; tolerates waits longer than one
    /// counter period. Returns immediately when the counter is stopped.
    pub fn sleep(&self, ticks: u64) {
        if !self.counter.is_running() {
            return;
        }
        let mask = self.mask();
        let mut remaining = ticks;
        let mut prev = self.counter.read_now();
        loop {
            let now = self.counter.read_now();
            let elapsed = (now.wrapping_sub(prev) & mask) as u64;
            if elapsed >= remaining {
                return;
            }
            remaining -= elapsed;
            prev = now;
        }
    }

    /// Services the compare interrupt: consumes the mailbox, then fires
    /// every record at the head of the feed whose deadline lies within
    /// [`CALLBACK_JITTER`] behind `now`. Periodic records are reinserted at
    /// `target + delay` before their callback runs; one-shots are unlinked.
    ///
    /// Hardware backends call this from the compare ISR (usually through
    /// [`crate::chain::dispatch`]).
    pub fn tick(&self) {
        self.mailbox.set_tick_in_progress(true);
        let mut now = self.counter.read_now();

        // The pending request is serviced against the same snapshot the
        // drain below starts from.
        if let Some(op) = critical_section::with(|cs| self.mailbox.take(cs)) {
            self.apply(op, now);
        }

        loop {
            let due = critical_section::with(|cs| {
                let head = self.feed.head(cs)?;
                if now.wrapping_sub(head.target(cs)) & self.mask() >= CALLBACK_JITTER {
                    return None;
                }
                if head.is_periodic() {
                    let new_target =
                        head.target(cs).wrapping_add(head.delay_ticks(cs)) & self.mask();
                    self.feed.update_target(cs, &self.counter, head, new_target, now);
                } else {
                    self.feed.remove(cs, &self.counter, head, now);
                }
                Some(head.callback())
            });
            match due {
                Some(callback) => {
                    callback.invoke();
                    // Callbacks may have taken arbitrary time.
                    now = self.counter.read_now();
                }
                None => break,
            }
        }

        self.mailbox.set_tick_in_progress(false);
    }

    fn route(&self, op: Op<'a>) {
        if self.counter.is_running() && !self.mailbox.tick_in_progress() {
            self.mailbox.post(op);
            self.counter.trigger_compare_interrupt();
        } else {
            let now = self.counter.read_now();
            self.apply(op, now);
        }
    }

    fn apply(&self, op: Op<'a>, now: u32) {
        match op {
            Op::Attach(timer) => self.attach_now(timer, now),
            Op::Detach(timer) => self.detach_now(timer, now),
            Op::ChangeDelay(timer, delay) => self.change_delay_now(timer, delay, now),
            Op::AttachInSync(timer, reference) => self.attach_in_sync_now(timer, reference, now),
            Op::ManualFire(timer) => self.manual_fire_now(timer, now),
        }
    }

    fn attach_now(&self, timer: &'a Timer<'a>, now: u32) {
        critical_section::with(|cs| {
            if timer.attached(cs) {
                return;
            }
            let target = now.wrapping_add(timer.delay_ticks(cs)) & self.mask();
            timer.set_target(cs, target);
            self.feed.insert(cs, &self.counter, timer, now);
        });
    }

    fn detach_now(&self, timer: &'a Timer<'a>, now: u32) {
        critical_section::with(|cs| {
            self.feed.remove(cs, &self.counter, timer, now);
        });
    }

    fn change_delay_now(&self, timer: &'a Timer<'a>, new_delay: u32, now: u32) {
        let fire = critical_section::with(|cs| {
            if !timer.attached(cs) {
                timer.set_delay_ticks(cs, new_delay);
                return false;
            }
            let delay = timer.delay_ticks(cs);
            let remaining = self.feed.dist(timer.target(cs), now);
            let elapsed = delay.wrapping_sub(remaining) & self.mask();
            if elapsed > new_delay {
                // The new delay is already exceeded; fire outside the
                // critical section and restart from now. This breaks the
                // alignment to the virtual start but guarantees progress.
                true
            } else {
                let new_target =
                    timer.target(cs).wrapping_add(new_delay).wrapping_sub(delay) & self.mask();
                timer.set_delay_ticks(cs, new_delay);
                self.feed.update_target(cs, &self.counter, timer, new_target, now);
                false
            }
        });
        if fire {
            timer.callback().invoke();
            critical_section::with(|cs| {
                timer.set_delay_ticks(cs, new_delay);
                // The callback may have detached the timer.
                if timer.attached(cs) {
                    let new_target = now.wrapping_add(new_delay) & self.mask();
                    self.feed.update_target(cs, &self.counter, timer, new_target, now);
                }
            });
        }
    }

    fn attach_in_sync_now(&self, timer: &'a Timer<'a>, reference: &'a Timer<'a>, now: u32) {
        critical_section::with(|cs| {
            if timer.attached(cs) {
                return;
            }
            let mask = self.mask();
            let delay = timer.delay_ticks(cs);
            // The reference's virtual start, i.e. the tick it was (last)
            // attached at.
            let start = reference
                .target(cs)
                .wrapping_sub(reference.delay_ticks(cs))
                & mask;
            let gap = now.wrapping_sub(start) & mask;
            // Earliest tick strictly after now congruent to the virtual
            // start modulo the delay.
            let increment = delay - gap % delay;
            timer.set_target(cs, now.wrapping_add(increment) & mask);
            self.feed.insert(cs, &self.counter, timer, now);
        });
    }

    fn manual_fire_now(&self, timer: &'a Timer<'a>, now: u32) {
        critical_section::with(|cs| {
            if timer.attached(cs) {
                self.feed.remove(cs, &self.counter, timer, now);
            }
        });
        timer.callback().invoke();
        if timer.is_periodic() {
            critical_section::with(|cs| {
                // The callback may have attached the timer itself already.
                if !timer.attached(cs) {
                    let target = now.wrapping_add(timer.delay_ticks(cs)) & self.mask();
                    timer.set_target(cs, target);
                    self.feed.insert(cs, &self.counter, timer, now);
                }
            });
        }
    }
}

impl<C: CounterApi + Sync + 'static> TickControl<'static, C> {
    /// Registers this control with the process-wide compare-elapsed
    /// [`chain`], so interrupts of its counter reach [`TickControl::tick`].
    pub fn register(&'static self) {
        chain::register(&self.link, self);
    }

    /// Removes this control from the compare-elapsed [`chain`].
    pub fn unregister(&'static self) {
        chain::unregister(&self.link);
    }
}

impl<C: CounterApi + Sync + 'static> CompareHook for TickControl<'static, C> {
    fn compare_elapsed(&self, id: CounterId) {
        if id == self.counter.id() {
            self.tick();
        }
    }
}
