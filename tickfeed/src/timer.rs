//! Application-owned timer records.
//!
//! A [`Timer`] holds the parameters of one logical timer (delay, periodicity,
//! callback) together with its schedule state (firing target, attached flag,
//! successor link). Records are owned by the application - typically as
//! `static`s, all constructors are `const` - and are only ever borrowed by
//! the scheduler. The schedule state is shared with the compare ISR and
//! therefore lives in `Cell`s behind a [`critical_section::Mutex`].

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

/// An action with context, invoked when a timer fires.
///
/// Implement this on an application type to receive the firing event together
/// with a reference to your own state, or use the ready-made
/// [`ContextCallback`] adapter. Handlers run in the compare ISR and must
/// return in bounded time.
pub trait FireHandler: Sync {
    fn fire(&self);
}

/// Pairs a plain function with a caller-supplied context value, turning the
/// two into a [`FireHandler`].
pub struct ContextCallback<C> {
    context: C,
    f: fn(&C),
}

impl<C> ContextCallback<C> {
    pub const fn new(context: C, f: fn(&C)) -> Self {
        Self { context, f }
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C: Sync> FireHandler for ContextCallback<C> {
    fn fire(&self) {
        (self.f)(&self.context)
    }
}

/// The action invoked when a timer fires.
///
/// The two shapes replace the virtual dispatch a classic implementation would
/// use: a plain function, or a function paired with a context reference. The
/// record layout stays uniform either way.
#[derive(Clone, Copy)]
pub enum Callback<'a> {
    Plain(fn()),
    Handler(&'a dyn FireHandler),
}

impl Callback<'_> {
    pub(crate) fn invoke(&self) {
        match self {
            Callback::Plain(f) => f(),
            Callback::Handler(handler) => handler.fire(),
        }
    }
}

/// Schedule state, meaningful only while the record is attached to a feed.
struct ScheduleState<'a> {
    /// Nominal period between firings, in ticks. Strictly positive.
    delay: Cell<u32>,
    /// Counter value the timer fires at next.
    target: Cell<u32>,
    /// Whether the record is linked into a feed.
    attached: Cell<bool>,
    /// Successor in the feed. Never an ownership edge.
    next: Cell<Option<&'a Timer<'a>>>,
}

/// One logical timer, handled by a [`crate::TickControl`].
///
/// Attach it to a control to receive callbacks.
pub struct Timer<'a> {
    periodic: bool,
    callback: Callback<'a>,
    state: Mutex<ScheduleState<'a>>,
}

impl<'a> Timer<'a> {
    /// A timer invoking a plain function after `delay` ticks, restarting
    /// immediately after firing when `periodic` is set.
    ///
    /// `delay` must be strictly positive.
    pub const fn new(delay: u32, periodic: bool, f: fn()) -> Self {
        Self::with_callback(delay, periodic, Callback::Plain(f))
    }

    /// A timer invoking a context-carrying handler, see [`FireHandler`].
    ///
    /// `delay` must be strictly positive.
    pub const fn with_handler(delay: u32, periodic: bool, handler: &'a dyn FireHandler) -> Self {
        Self::with_callback(delay, periodic, Callback::Handler(handler))
    }

    const fn with_callback(delay: u32, periodic: bool, callback: Callback<'a>) -> Self {
        debug_assert!(delay > 0);
        Self {
            periodic,
            callback,
            state: Mutex::new(ScheduleState {
                delay: Cell::new(delay),
                target: Cell::new(0),
                attached: Cell::new(false),
                next: Cell::new(None),
            }),
        }
    }

    /// The sentinel head of a feed. Never fires; only its successor link is
    /// used.
    pub(crate) const fn sentinel() -> Self {
        Self::with_callback(1, false, Callback::Plain(noop))
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Whether the timer is currently attached to a feed.
    pub fn is_attached(&self) -> bool {
        critical_section::with(|cs| self.attached(cs))
    }

    /// The nominal period between firings, in ticks.
    ///
    /// Changing the delay of an attached timer goes through
    /// [`crate::TickControl::change_delay`] so the schedule stays consistent.
    pub fn delay(&self) -> u32 {
        critical_section::with(|cs| self.delay_ticks(cs))
    }

    pub(crate) fn callback(&self) -> Callback<'a> {
        self.callback
    }

    pub(crate) fn delay_ticks(&self, cs: CriticalSection) -> u32 {
        self.state.borrow(cs).delay.get()
    }

    pub(crate) fn set_delay_ticks(&self, cs: CriticalSection, delay: u32) {
        self.state.borrow(cs).delay.set(delay);
    }

    pub(crate) fn target(&self, cs: CriticalSection) -> u32 {
        self.state.borrow(cs).target.get()
    }

    pub(crate) fn set_target(&self, cs: CriticalSection, target: u32) {
        self.state.borrow(cs).target.set(target);
    }

    pub(crate) fn attached(&self, cs: CriticalSection) -> bool {
        self.state.borrow(cs).attached.get()
    }

    pub(crate) fn set_attached(&self, cs: CriticalSection, attached: bool) {
        self.state.borrow(cs).attached.set(attached);
    }

    pub(crate) fn next(&self, cs: CriticalSection) -> Option<&'a Timer<'a>> {
        self.state.borrow(cs).next.get()
    }

    pub(crate) fn set_next(&self, cs: CriticalSection, next: Option<&'a Timer<'a>>) {
        self.state.borrow(cs).next.set(next);
    }
}

fn noop() {}

#[cfg(test)]
mod tests {
    use portable_atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn construction() {
        let timer = Timer::new(100, false, noop);
        assert_eq!(timer.delay(), 100);
        assert!(!timer.is_periodic());
        assert!(!timer.is_attached());
    }

    #[test]
    fn context_callback() {
        let handler = ContextCallback::new(AtomicU32::new(0), |count: &AtomicU32| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        let timer = Timer::with_handler(10, true, &handler);
        timer.callback().invoke();
        timer.callback().invoke();
        assert_eq!(handler.context().load(Ordering::Relaxed), 2);
    }
}
