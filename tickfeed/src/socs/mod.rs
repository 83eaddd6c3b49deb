//! Counter backends for actual silicon.

#[cfg(feature = "nrf52840")]
pub mod nrf;
