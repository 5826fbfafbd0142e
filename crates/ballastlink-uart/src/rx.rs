//! Background receiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, warn};

use crate::config::LinkConfig;
use crate::demod::{Demod, OVERSAMPLE};
use crate::error::{Result, UartError};
use crate::pin::RxPin;
use crate::wave::{unpack_symbol, wait_until};

struct Sampler<P> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<P>,
    bytes: Receiver<u8>,
}

/// Receiving end of the link.
///
/// Lifecycle mirrors the transmitter: [`bind`](Self::bind),
/// [`close_stale`](Self::close_stale), [`open`](Self::open), then
/// [`poll`](Self::poll). While open, a sampler thread owns the pin,
/// oversamples the line at 4x baud, and queues decoded stream bytes; a
/// 9-bit symbol becomes two bytes, the data byte then the ninth bit.
/// `poll` drains that queue and never blocks.
pub struct SoftUartRx<P: RxPin + 'static> {
    pin_number: u8,
    cfg: LinkConfig,
    pin: Option<P>,
    sampler: Option<Sampler<P>>,
}

impl<P: RxPin + 'static> SoftUartRx<P> {
    /// Bind `pin` with the given link parameters. The endpoint starts
    /// closed; nothing is sampled until [`open`](Self::open).
    pub fn bind(pin_number: u8, pin: P, cfg: LinkConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            pin_number,
            cfg,
            pin: Some(pin),
            sampler: None,
        })
    }

    /// Start the sampler thread.
    pub fn open(&mut self) -> Result<()> {
        if self.sampler.is_some() {
            return Err(UartError::AlreadyOpen {
                pin: self.pin_number,
            });
        }
        let mut pin = self.pin.take().ok_or(UartError::WorkerGone {
            pin: self.pin_number,
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let stopping = stop.clone();
        let (sink, bytes) = unbounded::<u8>();
        let cfg = self.cfg;
        let pin_number = self.pin_number;
        let handle = thread::Builder::new()
            .name(format!("uart-rx-{pin_number}"))
            .spawn(move || {
                let sample_period = cfg.bit_period() / OVERSAMPLE;
                let mut demod = Demod::new(&cfg);
                let mut scratch = Vec::with_capacity(cfg.bytes_per_symbol());
                let mut reported_errors = 0;
                let mut next = Instant::now() + sample_period;
                while !stopping.load(Ordering::Relaxed) {
                    if let Some(sym) = demod.sample(pin.is_high()) {
                        scratch.clear();
                        unpack_symbol(sym, &cfg, &mut scratch);
                        for &byte in &scratch {
                            if sink.send(byte).is_err() {
                                // The endpoint dropped its receiver.
                                return pin;
                            }
                        }
                    }
                    if demod.framing_errors() > reported_errors {
                        reported_errors = demod.framing_errors();
                        warn!(pin = pin_number, total = reported_errors, "framing error");
                    }
                    wait_until(next);
                    next += sample_period;
                    // Re-anchor the sample clock if the scheduler starved us.
                    let now = Instant::now();
                    if now > next + sample_period * OVERSAMPLE {
                        next = now + sample_period;
                    }
                }
                pin
            })
            .map_err(|source| UartError::Spawn {
                pin: pin_number,
                source,
            })?;

        self.sampler = Some(Sampler {
            stop,
            handle,
            bytes,
        });
        info!(
            pin = self.pin_number,
            baud = self.cfg.baud_rate,
            bits = self.cfg.data_bits,
            "rx open"
        );
        Ok(())
    }

    /// Drain every byte that arrived since the previous poll. Returns an
    /// empty vector when nothing is pending; never blocks.
    pub fn poll(&self) -> Result<Vec<u8>> {
        let sampler = self.sampler.as_ref().ok_or(UartError::NotOpen {
            pin: self.pin_number,
        })?;
        let mut out = Vec::new();
        while let Ok(byte) = sampler.bytes.try_recv() {
            out.push(byte);
        }
        Ok(out)
    }

    /// Stop the sampler and take the pin back so the endpoint can be
    /// reopened.
    pub fn close(&mut self) -> Result<()> {
        let sampler = self.sampler.take().ok_or(UartError::NotOpen {
            pin: self.pin_number,
        })?;
        sampler.stop.store(true, Ordering::Relaxed);
        let pin = sampler.handle.join().map_err(|_| UartError::WorkerGone {
            pin: self.pin_number,
        })?;
        self.pin = Some(pin);
        info!(pin = self.pin_number, "rx closed");
        Ok(())
    }

    /// Startup cleanup: close a binding left over from a previous run.
    ///
    /// Identical to [`close`](Self::close) except that "not currently
    /// open" is treated as success. The relaxation applies to this call
    /// only; every other operation keeps its strict error reporting.
    pub fn close_stale(&mut self) -> Result<()> {
        match self.close() {
            Err(UartError::NotOpen { .. }) => Ok(()),
            other => other,
        }
    }
}

impl<P: RxPin + 'static> Drop for SoftUartRx<P> {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop.store(true, Ordering::Relaxed);
            let _ = sampler.handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A line that never leaves its idle state.
    struct IdleLine;

    impl RxPin for IdleLine {
        fn is_high(&mut self) -> bool {
            true
        }
    }

    fn endpoint() -> SoftUartRx<IdleLine> {
        SoftUartRx::bind(25, IdleLine, LinkConfig::default()).unwrap()
    }

    #[test]
    fn poll_requires_an_open_endpoint() {
        let rx = endpoint();
        assert!(matches!(rx.poll(), Err(UartError::NotOpen { pin: 25 })));
    }

    #[test]
    fn idle_line_polls_empty() {
        let mut rx = endpoint();
        rx.open().unwrap();
        assert!(rx.poll().unwrap().is_empty());
        rx.close().unwrap();
    }

    #[test]
    fn open_twice_is_an_error() {
        let mut rx = endpoint();
        rx.open().unwrap();
        assert!(matches!(rx.open(), Err(UartError::AlreadyOpen { pin: 25 })));
        rx.close().unwrap();
    }

    #[test]
    fn startup_cleanup_is_idempotent() {
        let mut rx = endpoint();
        rx.close_stale().unwrap();
        rx.close_stale().unwrap();

        rx.open().unwrap();
        rx.close_stale().unwrap();
        rx.close_stale().unwrap();
    }

    #[test]
    fn endpoint_reopens_after_close() {
        let mut rx = endpoint();
        rx.open().unwrap();
        rx.close().unwrap();
        rx.open().unwrap();
        assert!(rx.poll().unwrap().is_empty());
        rx.close().unwrap();
    }

    #[test]
    fn rejects_invalid_link_parameters() {
        assert!(matches!(
            SoftUartRx::bind(25, IdleLine, LinkConfig { baud_rate: 10, data_bits: 9 }),
            Err(UartError::InvalidBaud { baud: 10, .. })
        ));
    }
}
