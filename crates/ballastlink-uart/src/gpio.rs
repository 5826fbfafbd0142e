//! Raspberry Pi pin access via rppal. Pin numbers use BCM numbering.

use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{Result, UartError};
use crate::pin::{RxPin, TxPin};

/// TX line on a Raspberry Pi GPIO pin.
pub struct TxGpio {
    pin: OutputPin,
}

/// Claim `pin` for output, idling high (the UART mark state).
pub fn claim_tx(pin: u8) -> Result<TxGpio> {
    let gpio = Gpio::new().map_err(|source| UartError::Gpio { pin, source })?;
    let out = gpio
        .get(pin)
        .map_err(|source| UartError::Gpio { pin, source })?
        .into_output_high();
    Ok(TxGpio { pin: out })
}

impl TxPin for TxGpio {
    fn set_level(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// RX line on a Raspberry Pi GPIO pin.
pub struct RxGpio {
    pin: InputPin,
}

/// Claim `pin` for input.
pub fn claim_rx(pin: u8) -> Result<RxGpio> {
    let gpio = Gpio::new().map_err(|source| UartError::Gpio { pin, source })?;
    let input = gpio
        .get(pin)
        .map_err(|source| UartError::Gpio { pin, source })?
        .into_input();
    Ok(RxGpio { pin: input })
}

impl RxPin for RxGpio {
    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}
