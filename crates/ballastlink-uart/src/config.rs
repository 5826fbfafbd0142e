use std::time::Duration;

use crate::error::{Result, UartError};

/// Lowest baud rate the capability accepts.
pub const MIN_BAUD: u32 = 50;
/// Highest baud rate the capability accepts.
pub const MAX_BAUD: u32 = 250_000;

/// Narrowest symbol the capability accepts.
pub const MIN_DATA_BITS: u8 = 1;
/// Widest symbol the capability accepts. Symbols are held in `u16`.
pub const MAX_DATA_BITS: u8 = 16;

/// Serial parameters of one end of the link.
///
/// Start and stop framing is fixed: one low start bit and one high stop
/// bit around every symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Signaling rate in bits per second.
    pub baud_rate: u32,
    /// Data bits per symbol.
    pub data_bits: u8,
}

impl LinkConfig {
    /// Validated constructor.
    pub fn new(baud_rate: u32, data_bits: u8) -> Result<Self> {
        let cfg = Self {
            baud_rate,
            data_bits,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the parameters against the supported ranges.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BAUD..=MAX_BAUD).contains(&self.baud_rate) {
            return Err(UartError::InvalidBaud {
                baud: self.baud_rate,
                min: MIN_BAUD,
                max: MAX_BAUD,
            });
        }
        if !(MIN_DATA_BITS..=MAX_DATA_BITS).contains(&self.data_bits) {
            return Err(UartError::InvalidDataBits {
                bits: self.data_bits,
                min: MIN_DATA_BITS,
                max: MAX_DATA_BITS,
            });
        }
        Ok(())
    }

    /// Wire time of a single bit.
    pub fn bit_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.baud_rate))
    }

    /// Stream bytes consumed (or produced) per symbol.
    pub fn bytes_per_symbol(&self) -> usize {
        if self.data_bits > 8 {
            2
        } else {
            1
        }
    }

    /// Wire bits per symbol, including start and stop.
    pub fn bits_per_symbol(&self) -> u32 {
        u32::from(self.data_bits) + 2
    }

    /// Wire time of `symbols` back-to-back symbols.
    pub fn frame_duration(&self, symbols: usize) -> Duration {
        self.bit_period() * (self.bits_per_symbol() * symbols as u32)
    }
}

impl Default for LinkConfig {
    /// The ballast link: 2400 baud, 9-bit symbols (8 data + even parity).
    fn default() -> Self {
        Self {
            baud_rate: 2400,
            data_bits: 9,
        }
    }
}
