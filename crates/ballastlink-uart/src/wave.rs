//! Symbol packing and waveform rendering.

use std::time::{Duration, Instant};

use crate::config::LinkConfig;
use crate::error::{Result, UartError};

/// Pack a frame byte stream into wire symbols.
///
/// Symbols up to 8 bits wide take one byte each. Wider symbols take two
/// adjacent bytes, low byte first, so a 9-bit symbol arrives as
/// `[data, high_bit]` — the layout the frame codec produces.
pub fn pack_symbols(data: &[u8], cfg: &LinkConfig) -> Result<Vec<u16>> {
    let step = cfg.bytes_per_symbol();
    if data.len() % step != 0 {
        return Err(UartError::TruncatedSymbol {
            len: data.len(),
            bytes_per_symbol: step,
        });
    }
    Ok(data
        .chunks_exact(step)
        .map(|chunk| {
            let mut sym = u16::from(chunk[0]);
            if step == 2 {
                sym |= u16::from(chunk[1]) << 8;
            }
            sym
        })
        .collect())
}

/// Split a received symbol back into stream bytes, the inverse of
/// [`pack_symbols`].
pub fn unpack_symbol(sym: u16, cfg: &LinkConfig, out: &mut Vec<u8>) {
    out.push((sym & 0xFF) as u8);
    if cfg.bytes_per_symbol() == 2 {
        out.push((sym >> 8) as u8);
    }
}

/// Render the level schedule for `symbols`: per symbol a low start bit,
/// the data bits LSB-first, and a high stop bit. One entry per bit
/// period; the line idles high before and after the schedule.
pub fn frame_levels(symbols: &[u16], cfg: &LinkConfig) -> Vec<bool> {
    let mut levels = Vec::with_capacity(symbols.len() * cfg.bits_per_symbol() as usize);
    for &sym in symbols {
        levels.push(false);
        for bit in 0..cfg.data_bits {
            levels.push(sym & (1 << bit) != 0);
        }
        levels.push(true);
    }
    levels
}

/// Sleep until `deadline`, sleeping coarsely first and spinning the last
/// stretch. Bit periods here are hundreds of microseconds, below what
/// `thread::sleep` alone can hold.
pub(crate) fn wait_until(deadline: Instant) {
    const SPIN_WINDOW: Duration = Duration::from_micros(150);
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining > SPIN_WINDOW {
            std::thread::sleep(remaining - SPIN_WINDOW);
        } else {
            std::hint::spin_loop();
        }
    }
}
