use std::time::Duration;

use ballastlink_uart::{RxPin, SoftUartRx, UartError};

use crate::cmd::ListenArgs;
use crate::output::OutputFormat;

#[cfg(target_os = "linux")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(target_os = "linux")]
use std::sync::Arc;

#[cfg(target_os = "linux")]
use crate::exit::{CliError, CliResult, INTERNAL};

/// Pause between polls; long enough for more data to accumulate without
/// burning the CPU on an idle line.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(target_os = "linux")]
pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    use ballastlink_uart::LinkConfig;
    use tracing::info;

    use crate::cmd::{BAUD_RATE, RX_PIN, SYMBOL_BITS};
    use crate::exit::{uart_error, SUCCESS};
    use crate::output::print_bytes;

    let cfg = LinkConfig::new(BAUD_RATE, SYMBOL_BITS).map_err(|e| uart_error("link config", e))?;
    let pin =
        ballastlink_uart::gpio::claim_rx(RX_PIN).map_err(|e| uart_error("claiming rx pin", e))?;
    let mut rx = SoftUartRx::bind(RX_PIN, pin, cfg).map_err(|e| uart_error("binding rx pin", e))?;
    rx.close_stale().map_err(|e| uart_error("startup cleanup", e))?;
    rx.open().map_err(|e| uart_error("opening rx pin", e))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let received = service_poll(&mut rx, |bytes| print_bytes("rx", bytes, format))
            .map_err(|e| uart_error("polling rx pin", e))?;
        if received > 0 {
            printed = printed.saturating_add(1);
            if let Some(count) = args.count {
                if printed >= count {
                    break;
                }
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    rx.close().map_err(|e| uart_error("closing rx pin", e))?;
    info!(batches = printed, "listener done");
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: ListenArgs, _format: OutputFormat) -> crate::exit::CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::INTERNAL,
        "the bench tool drives Raspberry Pi GPIO and only runs on linux",
    ))
}

#[cfg(target_os = "linux")]
fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// One pass of the receive loop: poll the capability and emit one dump
/// when anything arrived. Returns the number of bytes seen; received
/// bytes are printed raw, parity slots included.
fn service_poll<S: PollSource>(
    source: &mut S,
    mut emit: impl FnMut(&[u8]),
) -> Result<usize, UartError> {
    let bytes = source.poll()?;
    if !bytes.is_empty() {
        emit(&bytes);
    }
    Ok(bytes.len())
}

/// Seam between the receive loop and the UART capability.
trait PollSource {
    fn poll(&mut self) -> Result<Vec<u8>, UartError>;
}

impl<P: RxPin + 'static> PollSource for SoftUartRx<P> {
    fn poll(&mut self) -> Result<Vec<u8>, UartError> {
        SoftUartRx::poll(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::output::hex_dump;

    struct ScriptedPort {
        polls: VecDeque<Vec<u8>>,
    }

    impl ScriptedPort {
        fn new(polls: impl IntoIterator<Item = Vec<u8>>) -> Self {
            Self {
                polls: polls.into_iter().collect(),
            }
        }
    }

    impl PollSource for ScriptedPort {
        fn poll(&mut self) -> Result<Vec<u8>, UartError> {
            Ok(self.polls.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn one_dump_line_per_nonempty_poll() {
        let mut port = ScriptedPort::new([vec![], vec![0x51, 0x00], vec![]]);
        let mut lines = Vec::new();
        let mut lines_after_each_poll = Vec::new();
        for _ in 0..3 {
            service_poll(&mut port, |bytes| lines.push(hex_dump(bytes))).unwrap();
            lines_after_each_poll.push(lines.len());
        }
        assert_eq!(lines, vec!["[0x51, 0x0]".to_string()]);
        // The line appears after the second poll and nothing follows.
        assert_eq!(lines_after_each_poll, vec![0, 1, 1]);
    }

    #[test]
    fn reports_byte_counts_without_filtering() {
        let mut port = ScriptedPort::new([vec![0x4C, 0x01, 0x46, 0x01]]);
        let mut seen = Vec::new();
        let count = service_poll(&mut port, |bytes| seen.extend_from_slice(bytes)).unwrap();
        assert_eq!(count, 4);
        assert_eq!(seen, vec![0x4C, 0x01, 0x46, 0x01]);
    }

    #[test]
    fn capability_failures_bubble_out() {
        struct BrokenPort;
        impl PollSource for BrokenPort {
            fn poll(&mut self) -> Result<Vec<u8>, UartError> {
                Err(UartError::NotOpen { pin: 25 })
            }
        }

        let mut emitted = false;
        let result = service_poll(&mut BrokenPort, |_| emitted = true);
        assert!(matches!(result, Err(UartError::NotOpen { pin: 25 })));
        assert!(!emitted);
    }
}
