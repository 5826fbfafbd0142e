//! Even-parity frame construction for the ballast serial link.
//!
//! Every symbol on the wire is 9 bits: 8 data bits followed by one even
//! parity bit. The UART capability only accepts 8-bit slots per stream
//! position, so the parity bit travels as its own byte (0 or 1) directly
//! after the data byte, and the capability folds each adjacent pair into
//! a single 9-bit symbol.

pub mod codec;
pub mod parity;

pub use codec::{assemble, assemble_into, SLOTS_PER_BYTE};
pub use parity::{parity_bit, PARITY};
