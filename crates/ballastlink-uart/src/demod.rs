//! Demodulation of an oversampled RX line.

use tracing::debug;

use crate::config::LinkConfig;

/// Samples taken per bit period.
pub const OVERSAMPLE: u32 = 4;

#[derive(Debug, Clone, Copy)]
enum State {
    /// Line idle or between symbols; watching for a start edge.
    Idle,
    /// Saw the first low sample; confirming at the start-bit center.
    Start { ticks: u32 },
    /// Collecting data bits at their centers.
    Data { ticks: u32, bit: u8, sym: u16 },
    /// Waiting for the stop-bit center.
    Stop { ticks: u32, sym: u16 },
    /// Bad stop bit; waiting for the line to return high.
    Resync,
}

/// Turns a stream of line samples into symbols.
///
/// Feed one sample every `bit_period / OVERSAMPLE`. A start bit is
/// confirmed half a bit after the first low sample (narrow glitches are
/// dropped), data bits are read at their centers, and a low stop bit
/// discards the symbol and resynchronizes on the next high line.
pub struct Demod {
    data_bits: u8,
    state: State,
    framing_errors: u64,
}

impl Demod {
    pub fn new(cfg: &LinkConfig) -> Self {
        Self {
            data_bits: cfg.data_bits,
            state: State::Idle,
            framing_errors: 0,
        }
    }

    /// Symbols dropped so far for a bad stop bit.
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    /// Advance by one sample period. Returns a symbol when one completes.
    pub fn sample(&mut self, high: bool) -> Option<u16> {
        match self.state {
            State::Idle => {
                if !high {
                    self.state = State::Start {
                        ticks: OVERSAMPLE / 2,
                    };
                }
                None
            }
            State::Start { ticks } => {
                if ticks > 1 {
                    self.state = State::Start { ticks: ticks - 1 };
                } else if high {
                    // Narrow glitch, not a start bit.
                    self.state = State::Idle;
                } else {
                    self.state = State::Data {
                        ticks: OVERSAMPLE,
                        bit: 0,
                        sym: 0,
                    };
                }
                None
            }
            State::Data { ticks, bit, sym } => {
                if ticks > 1 {
                    self.state = State::Data {
                        ticks: ticks - 1,
                        bit,
                        sym,
                    };
                    return None;
                }
                let sym = sym | (u16::from(high) << bit);
                if bit + 1 == self.data_bits {
                    self.state = State::Stop {
                        ticks: OVERSAMPLE,
                        sym,
                    };
                } else {
                    self.state = State::Data {
                        ticks: OVERSAMPLE,
                        bit: bit + 1,
                        sym,
                    };
                }
                None
            }
            State::Stop { ticks, sym } => {
                if ticks > 1 {
                    self.state = State::Stop {
                        ticks: ticks - 1,
                        sym,
                    };
                    None
                } else if high {
                    self.state = State::Idle;
                    Some(sym)
                } else {
                    self.framing_errors += 1;
                    debug!(sym, total = self.framing_errors, "bad stop bit, dropping symbol");
                    self.state = State::Resync;
                    None
                }
            }
            State::Resync => {
                if high {
                    self.state = State::Idle;
                }
                None
            }
        }
    }
}
