//! Background transmitter.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::{Result, UartError};
use crate::pin::TxPin;
use crate::wave::{frame_levels, pack_symbols, wait_until};

/// Busy flag shared with the worker; the condvar wakes [`SoftUartTx::wait_idle`].
struct TxState {
    busy: Mutex<bool>,
    idle: Condvar,
}

struct Worker<P> {
    frames: Sender<Vec<bool>>,
    handle: JoinHandle<P>,
}

/// Transmitting end of the link.
///
/// Lifecycle: [`bind`](Self::bind) a pin, [`close_stale`](Self::close_stale)
/// any previous binding, [`open`](Self::open), then
/// [`transmit`](Self::transmit) frames. While open, a worker thread owns
/// the pin and paces queued waveforms on a monotonic bit clock;
/// [`close`](Self::close) joins the worker and recovers the pin so the
/// endpoint can be reopened.
pub struct SoftUartTx<P: TxPin + 'static> {
    pin_number: u8,
    cfg: LinkConfig,
    pin: Option<P>,
    worker: Option<Worker<P>>,
    state: Arc<TxState>,
}

impl<P: TxPin + 'static> SoftUartTx<P> {
    /// Bind `pin` with the given link parameters. The endpoint starts
    /// closed; nothing is driven until [`open`](Self::open).
    pub fn bind(pin_number: u8, pin: P, cfg: LinkConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            pin_number,
            cfg,
            pin: Some(pin),
            worker: None,
            state: Arc::new(TxState {
                busy: Mutex::new(false),
                idle: Condvar::new(),
            }),
        })
    }

    /// Start the transmit worker. The line is driven to its high idle
    /// state immediately.
    pub fn open(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(UartError::AlreadyOpen {
                pin: self.pin_number,
            });
        }
        let mut pin = self.pin.take().ok_or(UartError::WorkerGone {
            pin: self.pin_number,
        })?;

        let (frames, queue) = unbounded::<Vec<bool>>();
        let state = self.state.clone();
        let period = self.cfg.bit_period();
        let handle = thread::Builder::new()
            .name(format!("uart-tx-{}", self.pin_number))
            .spawn(move || {
                pin.set_level(true);
                // The sender side hanging up is the close signal.
                while let Ok(levels) = queue.recv() {
                    let mut deadline = Instant::now();
                    for level in levels {
                        pin.set_level(level);
                        deadline += period;
                        wait_until(deadline);
                    }
                    pin.set_level(true);
                    *lock_ignoring_poison(&state.busy) = false;
                    state.idle.notify_all();
                }
                pin
            })
            .map_err(|source| UartError::Spawn {
                pin: self.pin_number,
                source,
            })?;

        self.worker = Some(Worker { frames, handle });
        info!(
            pin = self.pin_number,
            baud = self.cfg.baud_rate,
            bits = self.cfg.data_bits,
            "tx open"
        );
        Ok(())
    }

    /// Queue a frame byte stream for transmission and start sending it.
    ///
    /// Returns [`UartError::Busy`] while a previous frame is still on
    /// the wire; wait with [`wait_idle`](Self::wait_idle) first.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(UartError::NotOpen {
            pin: self.pin_number,
        })?;
        let symbols = pack_symbols(frame, &self.cfg)?;
        {
            let mut busy = lock_ignoring_poison(&self.state.busy);
            if *busy {
                return Err(UartError::Busy {
                    pin: self.pin_number,
                });
            }
            *busy = true;
        }
        let levels = frame_levels(&symbols, &self.cfg);
        if worker.frames.send(levels).is_err() {
            *lock_ignoring_poison(&self.state.busy) = false;
            return Err(UartError::WorkerGone {
                pin: self.pin_number,
            });
        }
        debug!(
            pin = self.pin_number,
            symbols = symbols.len(),
            "waveform queued"
        );
        Ok(())
    }

    /// Whether a frame is still being clocked out.
    pub fn is_busy(&self) -> bool {
        *lock_ignoring_poison(&self.state.busy)
    }

    /// Block until the line is idle, or fail with
    /// [`UartError::TxTimeout`] once `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> Result<()> {
        if self.worker.is_none() {
            return Err(UartError::NotOpen {
                pin: self.pin_number,
            });
        }
        let deadline = Instant::now() + timeout;
        let mut busy = lock_ignoring_poison(&self.state.busy);
        while *busy {
            let now = Instant::now();
            if now >= deadline {
                return Err(UartError::TxTimeout {
                    pin: self.pin_number,
                    timeout,
                });
            }
            let (guard, _) = self
                .state
                .idle
                .wait_timeout(busy, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            busy = guard;
        }
        Ok(())
    }

    /// Stop the worker, draining anything already queued, and take the
    /// pin back so the endpoint can be reopened.
    pub fn close(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(UartError::NotOpen {
            pin: self.pin_number,
        })?;
        drop(worker.frames);
        let pin = worker.handle.join().map_err(|_| UartError::WorkerGone {
            pin: self.pin_number,
        })?;
        self.pin = Some(pin);
        info!(pin = self.pin_number, "tx closed");
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

impl<P: TxPin + 'static> Drop for SoftUartTx<P> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            drop(worker.frames);
            let _ = worker.handle.join();
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct RecordingPin {
        levels: Arc<StdMutex<Vec<bool>>>,
    }

    impl TxPin for RecordingPin {
        fn set_level(&mut self, high: bool) {
            self.levels.lock().unwrap().push(high);
        }
    }

    fn fast_cfg() -> LinkConfig {
        LinkConfig::new(250_000, 9).unwrap()
    }

    #[test]
    fn clocks_out_the_frame_schedule() {
        let pin = RecordingPin::default();
        let recorded = pin.levels.clone();
        let cfg = fast_cfg();
        let mut tx = SoftUartTx::bind(24, pin, cfg).unwrap();
        tx.open().unwrap();
        tx.transmit(&[0x51, 0x00]).unwrap();
        tx.wait_idle(Duration::from_secs(1)).unwrap();
        tx.close().unwrap();

        let mut expected = vec![true]; // idle level on open
        expected.extend(frame_levels(&[0x0051], &cfg));
        expected.push(true); // idle level after the frame
        assert_eq!(*recorded.lock().unwrap(), expected);
    }

    #[test]
    fn transmit_requires_an_open_endpoint() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        assert!(matches!(
            tx.transmit(&[0x51, 0x00]),
            Err(UartError::NotOpen { pin: 24 })
        ));
    }

    #[test]
    fn open_twice_is_an_error() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        tx.open().unwrap();
        assert!(matches!(tx.open(), Err(UartError::AlreadyOpen { pin: 24 })));
        tx.close().unwrap();
    }

    #[test]
    fn close_without_open_reports_not_open() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        assert!(matches!(tx.close(), Err(UartError::NotOpen { pin: 24 })));
    }

    #[test]
    fn startup_cleanup_is_idempotent() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        tx.close_stale().unwrap();
        tx.close_stale().unwrap();

        tx.open().unwrap();
        tx.close_stale().unwrap();
        tx.close_stale().unwrap();
    }

    #[test]
    fn endpoint_reopens_after_close() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        tx.open().unwrap();
        tx.close().unwrap();
        tx.open().unwrap();
        tx.transmit(&[0x0D, 0x01]).unwrap();
        tx.wait_idle(Duration::from_secs(1)).unwrap();
        tx.close().unwrap();
    }

    #[test]
    fn rejects_a_frame_that_ends_mid_symbol() {
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), fast_cfg()).unwrap();
        tx.open().unwrap();
        assert!(matches!(
            tx.transmit(&[0x51, 0x00, 0x0D]),
            Err(UartError::TruncatedSymbol { .. })
        ));
        tx.close().unwrap();
    }

    #[test]
    fn overlapping_transmits_report_busy() {
        // Slow enough that the first frame is still on the wire.
        let cfg = LinkConfig::new(300, 8).unwrap();
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), cfg).unwrap();
        tx.open().unwrap();
        tx.transmit(&[0x51]).unwrap();
        assert!(tx.is_busy());
        assert!(matches!(
            tx.transmit(&[0x0D]),
            Err(UartError::Busy { pin: 24 })
        ));
        tx.wait_idle(Duration::from_secs(2)).unwrap();
        assert!(!tx.is_busy());
        tx.close().unwrap();
    }

    #[test]
    fn wait_idle_times_out_while_the_wire_is_hot() {
        let cfg = LinkConfig::new(50, 16).unwrap();
        let mut tx = SoftUartTx::bind(24, RecordingPin::default(), cfg).unwrap();
        tx.open().unwrap();
        tx.transmit(&[0x00, 0x00, 0x00, 0x00]).unwrap();
        assert!(matches!(
            tx.wait_idle(Duration::from_millis(10)),
            Err(UartError::TxTimeout { pin: 24, .. })
        ));
        tx.close().unwrap();
    }
}
