//! This crate multiplexes an unbounded number of logical software timers onto
//! a single hardware capture/compare channel:
//! - the [`CounterApi`] contract a hardware backend has to fulfill,
//! - the application-owned [`Timer`] records and their callbacks,
//! - the [`TickControl`] scheduler servicing the compare interrupt,
//! - the process-wide [`chain`] dispatching the compare-elapsed hook to live
//!   controls - currently a backend for nRF52840 is provided as a showcase.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
extern crate std;

pub mod chain;
pub mod control;
pub mod counter;
pub mod socs;
pub mod timer;

mod feed;
mod mailbox;

#[cfg(test)]
pub(crate) mod testutil;

pub use control::{TickControl, CALLBACK_JITTER};
pub use counter::{CounterApi, CounterId, CounterSettings, CounterWidth, MAX_PRESCALE};
pub use timer::{Callback, ContextCallback, FireHandler, Timer};
