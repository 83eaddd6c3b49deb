//! Process-wide dispatch of the hardware compare-elapsed hook.
//!
//! Some hardware layers funnel the compare-match events of every timer
//! peripheral through one global callback. This module fans that single hook
//! out to the live controls: each control registers a [`ChainLink`] carrying
//! a [`CompareHook`], and [`dispatch`] walks the chain handing the counter
//! identity to every hook. Hooks ignore identities other than their own
//! counter's.
//!
//! Registrations are `&'static`: controls are expected to live in `static`s
//! (e.g. via `static_cell`). Statics have no destructors, so unlike a C++
//! constructor/destructor pair, registration and deregistration are explicit
//! calls. Both run inside a critical section so the ISR never observes a
//! half-linked chain.

use core::cell::Cell;
use core::ptr;

use critical_section::Mutex;

use crate::counter::CounterId;

/// Receiver of the compare-elapsed hook.
pub trait CompareHook: Sync {
    /// Called for every compare-elapsed event in the system; `id` names the
    /// peripheral that raised it.
    fn compare_elapsed(&self, id: CounterId);
}

/// One registration slot in the chain. Embedded in every control.
pub struct ChainLink {
    hook: Mutex<Cell<Option<&'static dyn CompareHook>>>,
    next: Mutex<Cell<Option<&'static ChainLink>>>,
}

impl ChainLink {
    pub const fn new() -> Self {
        Self {
            hook: Mutex::new(Cell::new(None)),
            next: Mutex::new(Cell::new(None)),
        }
    }
}

impl Default for ChainLink {
    fn default() -> Self {
        Self::new()
    }
}

static CHAIN: Mutex<Cell<Option<&'static ChainLink>>> = Mutex::new(Cell::new(None));

/// Links `link` into the chain, delivering future events to `hook`.
/// Registering an already-registered link is a no-op.
pub fn register(link: &'static ChainLink, hook: &'static dyn CompareHook) {
    critical_section::with(|cs| {
        if link.hook.borrow(cs).get().is_some() {
            return;
        }
        link.hook.borrow(cs).set(Some(hook));
        link.next.borrow(cs).set(CHAIN.borrow(cs).get());
        CHAIN.borrow(cs).set(Some(link));
    });
}

/// Unlinks `link` from the chain. Unregistering a link that is not in the
/// chain is a no-op.
pub fn unregister(link: &'static ChainLink) {
    critical_section::with(|cs| {
        let mut cursor = &CHAIN;
        while let Some(current) = cursor.borrow(cs).get() {
            if ptr::eq(current, link) {
                cursor.borrow(cs).set(current.next.borrow(cs).get());
                current.next.borrow(cs).set(None);
                current.hook.borrow(cs).set(None);
                return;
            }
            cursor = &current.next;
        }
    });
}

/// The global compare-elapsed entry point. Hardware backends call this from
/// their interrupt handlers; every registered hook receives the event. Hooks
/// run outside the critical section.
pub fn dispatch(id: CounterId) {
    let mut cursor = critical_section::with(|cs| CHAIN.borrow(cs).get());
    while let Some(link) = cursor {
        let (hook, next) =
            critical_section::with(|cs| (link.hook.borrow(cs).get(), link.next.borrow(cs).get()));
        if let Some(hook) = hook {
            hook.compare_elapsed(id);
        }
        cursor = next;
    }
}

#[cfg(test)]
mod tests {
    use portable_atomic::{AtomicU32, Ordering};

    use super::*;

    struct CountingHook {
        id: CounterId,
        seen: AtomicU32,
    }

    impl CompareHook for CountingHook {
        fn compare_elapsed(&self, id: CounterId) {
            if id == self.id {
                self.seen.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn dispatch_reaches_matching_hooks_only() {
        static LINK_A: ChainLink = ChainLink::new();
        static LINK_B: ChainLink = ChainLink::new();
        static HOOK_A: CountingHook = CountingHook {
            id: CounterId::new(0xA),
            seen: AtomicU32::new(0),
        };
        static HOOK_B: CountingHook = CountingHook {
            id: CounterId::new(0xB),
            seen: AtomicU32::new(0),
        };

        register(&LINK_A, &HOOK_A);
        register(&LINK_B, &HOOK_B);
        // Double registration stays harmless.
        register(&LINK_A, &HOOK_A);

        dispatch(CounterId::new(0xA));
        assert_eq!(HOOK_A.seen.load(Ordering::Relaxed), 1);
        assert_eq!(HOOK_B.seen.load(Ordering::Relaxed), 0);

        dispatch(CounterId::new(0xB));
        assert_eq!(HOOK_A.seen.load(Ordering::Relaxed), 1);
        assert_eq!(HOOK_B.seen.load(Ordering::Relaxed), 1);

        unregister(&LINK_A);
        dispatch(CounterId::new(0xA));
        assert_eq!(HOOK_A.seen.load(Ordering::Relaxed), 1);

        unregister(&LINK_B);
        dispatch(CounterId::new(0xB));
        assert_eq!(HOOK_B.seen.load(Ordering::Relaxed), 1);
    }
}
