//! Pin seams between the UART engines and the hardware.

/// Output pin driving the TX line. High is the idle (mark) state.
pub trait TxPin: Send {
    fn set_level(&mut self, high: bool);
}

/// Input pin sampling the RX line.
pub trait RxPin: Send {
    fn is_high(&mut self) -> bool;
}
