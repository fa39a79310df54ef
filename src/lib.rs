//! Host side driver of LoRa 2.4GHz concentrator boards connected over a serial link.
//!
//! The crate is split in layers:
//!
//! - [`transport`] opens the serial device
//! - [`mcu::codec`] frames requests and acknowledgements
//! - [`mcu::command`] encodes and decodes every command of the MCU
//! - [`mcu::Mcu`] runs request/acknowledgement exchanges
//! - [`hal::Concentrator`] is the session applications drive
//!
//! [`hal::airtime`] estimates the time on air of a packet without any hardware.

pub mod config;
pub mod error;
pub mod hal;
pub mod mcu;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, Result};
pub use hal::Concentrator;

// reexport heapless
pub use heapless;
