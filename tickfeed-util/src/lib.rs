//! This crate contains generic utilities the other tickfeed crates depend
//! upon but that are not tied to timer scheduling itself.
//!
//! The main purpose of this crate is to make tickfeed as self-contained as
//! possible.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod log;

#[cfg(any(feature = "defmt", feature = "log"))]
pub use log::*;

/// A generic error.
#[derive(Debug, Clone, Copy)]
pub struct Error;

/// A type alias for `Result<T, tickfeed_util::Error>`.
pub type Result<T> = core::result::Result<T, Error>;
