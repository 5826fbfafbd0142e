//! Bit-banged UART capability for the ballast serial link.
//!
//! Drives an arbitrary GPIO pin as a serial line at a configured baud
//! rate and symbol width. Symbols wider than 8 bits consume two adjacent
//! stream bytes (low byte first) per symbol, the convention the frame
//! codec relies on. Transmit and receive each run on a background worker
//! that owns the pin while the endpoint is open; the driver-facing
//! surface is synchronous and never blocks without a deadline.
//!
//! The engines are generic over the [`pin`] traits so every driver above
//! this crate can run against fakes; [`gpio`] provides the Raspberry Pi
//! implementation.

pub mod config;
pub mod demod;
pub mod error;
pub mod pin;
pub mod rx;
pub mod tx;
pub mod wave;

#[cfg(target_os = "linux")]
pub mod gpio;

pub use config::LinkConfig;
pub use error::{Result, UartError};
pub use pin::{RxPin, TxPin};
pub use rx::SoftUartRx;
pub use tx::SoftUartTx;
