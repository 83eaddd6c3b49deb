//! The ordered schedule of attached timers.
//!
//! Timers are linked through their successor cells behind a sentinel root,
//! sorted by firing target. Order is the modular "sooner" relation relative
//! to a counter snapshot `now` taken once per scheduling step:
//! `x` is sooner than `y` iff `(x - now) mod M < (y - now) mod M`. Comparing
//! raw target values instead would break whenever the schedule straddles the
//! counter reload.
//!
//! The feed also keeps the hardware compare register aligned with its head:
//! every operation that changes the first record reprograms the compare
//! target, so the next interrupt always fires for the earliest deadline.

use core::ptr;

use critical_section::CriticalSection;

use crate::counter::CounterApi;
use crate::timer::Timer;

pub(crate) struct TimerFeed<'a> {
    root: Timer<'a>,
    mask: u32,
}

impl<'a> TimerFeed<'a> {
    pub(crate) const fn new(mask: u32) -> Self {
        Self {
            root: Timer::sentinel(),
            mask,
        }
    }

    pub(crate) const fn mask(&self) -> u32 {
        self.mask
    }

    /// Modular distance from `now` to `x`.
    pub(crate) fn dist(&self, x: u32, now: u32) -> u32 {
        x.wrapping_sub(now) & self.mask
    }

    pub(crate) fn head(&self, cs: CriticalSection) -> Option<&'a Timer<'a>> {
        self.root.next(cs)
    }

    /// Walks from `from` while the successor's target is modularly sooner
    /// than `target`; returns the last record whose successor slot the new
    /// record belongs into.
    pub(crate) fn find_insertion_link<'s>(
        &'s self,
        cs: CriticalSection,
        from: &'s Timer<'a>,
        target: u32,
        now: u32,
    ) -> &'s Timer<'a> {
        let dist_new = self.dist(target, now);
        let mut link = from;
        while let Some(next) = link.next(cs) {
            if self.dist(next.target(cs), now) < dist_new {
                link = next;
            } else {
                break;
            }
        }
        link
    }

    /// Splices `timer` between `link` and its successor. Refreshes the
    /// compare register when the new record becomes the head.
    pub(crate) fn insert_after<C: CounterApi>(
        &self,
        cs: CriticalSection,
        counter: &C,
        link: &Timer<'a>,
        timer: &'a Timer<'a>,
    ) {
        timer.set_next(cs, link.next(cs));
        timer.set_attached(cs, true);
        link.set_next(cs, Some(timer));
        if ptr::eq(link, &self.root) {
            counter.set_compare(timer.target(cs));
        }
    }

    /// Inserts `timer` at the position its target sorts to.
    pub(crate) fn insert<C: CounterApi>(
        &self,
        cs: CriticalSection,
        counter: &C,
        timer: &'a Timer<'a>,
        now: u32,
    ) {
        let link = self.find_insertion_link(cs, &self.root, timer.target(cs), now);
        self.insert_after(cs, counter, link, timer);
    }

    /// Unlinks `timer` and clears its attached flag. Refreshes the compare
    /// register when the head was removed; an emptied feed parks the compare
    /// at `now - 1`, the maximum future distance.
    pub(crate) fn remove<C: CounterApi>(
        &self,
        cs: CriticalSection,
        counter: &C,
        timer: &'a Timer<'a>,
        now: u32,
    ) {
        if !timer.attached(cs) {
            return;
        }
        let mut link: &Timer<'a> = &self.root;
        loop {
            match link.next(cs) {
                Some(next) if ptr::eq(next, timer) => break,
                Some(next) => link = next,
                // Attached but not reachable: the record belongs to another
                // control's feed. Leave it alone.
                None => return,
            }
        }
        link.set_next(cs, timer.next(cs));
        timer.set_next(cs, None);
        timer.set_attached(cs, false);
        if ptr::eq(link, &self.root) {
            match self.head(cs) {
                Some(head) => counter.set_compare(head.target(cs)),
                None => counter.set_compare(now.wrapping_sub(1) & self.mask),
            }
        }
    }

    /// Repositions an attached `timer` for `new_target` while preserving the
    /// feed sort. A single walk finds both the insertion predecessor and the
    /// current predecessor; the record is relinked only when the two differ.
    /// The compare register is refreshed whenever the head was involved.
    pub(crate) fn update_target<C: CounterApi>(
        &self,
        cs: CriticalSection,
        counter: &C,
        timer: &'a Timer<'a>,
        new_target: u32,
        now: u32,
    ) {
        let dist_new = self.dist(new_target, now);
        // Insertion predecessor: the last record, not counting `timer`
        // itself, whose target is sooner than the new one.
        let mut ins: &Timer<'a> = &self.root;
        let mut ins_done = false;
        // Current predecessor of `timer`.
        let mut rem: Option<&Timer<'a>> = None;
        let mut it: &Timer<'a> = &self.root;
        while let Some(next) = it.next(cs) {
            if ptr::eq(next, timer) {
                rem = Some(it);
                if ins_done {
                    break;
                }
            } else if !ins_done {
                if self.dist(next.target(cs), now) < dist_new {
                    ins = next;
                } else {
                    ins_done = true;
                    if rem.is_some() {
                        break;
                    }
                }
            }
            it = next;
        }

        timer.set_target(cs, new_target);
        let Some(rem) = rem else {
            // Not linked here; nothing to reposition.
            return;
        };

        let head_involved = ptr::eq(ins, &self.root) || ptr::eq(rem, &self.root);
        if !ptr::eq(ins, rem) {
            rem.set_next(cs, timer.next(cs));
            timer.set_next(cs, ins.next(cs));
            ins.set_next(cs, Some(timer));
        }
        if head_involved {
            if let Some(head) = self.head(cs) {
                counter.set_compare(head.target(cs));
            }
        }
    }
}
