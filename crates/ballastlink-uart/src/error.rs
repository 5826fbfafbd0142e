use std::time::Duration;

/// Errors from the software-UART capability.
#[derive(Debug, thiserror::Error)]
pub enum UartError {
    /// GPIO controller or pin access failed.
    #[cfg(target_os = "linux")]
    #[error("gpio error on pin {pin}: {source}")]
    Gpio {
        pin: u8,
        source: rppal::gpio::Error,
    },

    /// The endpoint is not open on this pin.
    #[error("pin {pin} is not open")]
    NotOpen { pin: u8 },

    /// The endpoint is already open on this pin.
    #[error("pin {pin} is already open")]
    AlreadyOpen { pin: u8 },

    /// Baud rate outside the supported range.
    #[error("unsupported baud rate {baud} (supported: {min}..={max})")]
    InvalidBaud { baud: u32, min: u32, max: u32 },

    /// Symbol width outside the supported range.
    #[error("unsupported symbol width of {bits} data bits (supported: {min}..={max})")]
    InvalidDataBits { bits: u8, min: u8, max: u8 },

    /// A wide-symbol byte stream ended in the middle of a symbol.
    #[error("stream of {len} bytes does not split into {bytes_per_symbol}-byte symbols")]
    TruncatedSymbol { len: usize, bytes_per_symbol: usize },

    /// A transmission is already in flight on this pin.
    #[error("transmitter on pin {pin} is busy")]
    Busy { pin: u8 },

    /// The transmitter did not drain within the allowed time.
    #[error("transmission on pin {pin} still busy after {timeout:?}")]
    TxTimeout { pin: u8, timeout: Duration },

    /// Spawning the background worker failed.
    #[error("spawning uart worker for pin {pin}: {source}")]
    Spawn { pin: u8, source: std::io::Error },

    /// The background worker is gone; the endpoint is unusable.
    #[error("uart worker for pin {pin} is gone")]
    WorkerGone { pin: u8 },
}

pub type Result<T> = std::result::Result<T, UartError>;
