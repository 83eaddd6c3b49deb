//! Counter implementation for nRF SoCs.

mod counter;

pub use counter::*;

pub mod export {
    pub use nrf52840_hal::pac;
}
