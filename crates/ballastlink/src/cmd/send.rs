use std::time::Duration;

use ballastlink_frame::assemble;
use ballastlink_uart::{LinkConfig, SoftUartTx, TxPin, UartError};

use crate::cmd::SendArgs;
use crate::output::OutputFormat;

/// The fixed query table the projector side cycles through: lamp
/// factor, status query, power query, lamp enable.
const MESSAGES: [&[u8]; 4] = [b"LF\r", b"Q\r", b"P\r", b"LE\r"];

/// Extra wait allowed beyond a frame's wire time before giving up on
/// the transmitter.
const DRAIN_MARGIN: Duration = Duration::from_millis(500);

#[cfg(target_os = "linux")]
pub fn run(_args: SendArgs, format: OutputFormat) -> crate::exit::CliResult<i32> {
    use std::io::{self, BufRead, Write};

    use tracing::info;

    use crate::cmd::{BAUD_RATE, SYMBOL_BITS, TX_PIN};
    use crate::exit::{io_error, uart_error, SUCCESS};
    use crate::output::print_bytes;

    let cfg = LinkConfig::new(BAUD_RATE, SYMBOL_BITS).map_err(|e| uart_error("link config", e))?;
    let pin = ballastlink_uart::gpio::claim_tx(TX_PIN)
        .map_err(|e| uart_error("claiming tx pin", e))?;
    let mut tx =
        SoftUartTx::bind(TX_PIN, pin, cfg).map_err(|e| uart_error("binding tx pin", e))?;
    tx.close_stale().map_err(|e| uart_error("startup cleanup", e))?;
    tx.open().map_err(|e| uart_error("opening tx pin", e))?;

    let mut cycle = MessageCycle::new(MESSAGES.len());
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("Send bytes");
        let _ = io::stdout().flush();
        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| io_error("reading trigger", e))?;
        if read == 0 {
            // Operator closed stdin.
            println!();
            break;
        }

        trigger(&mut tx, &mut cycle, &cfg, |frame| {
            print_bytes("tx", frame, format);
        })
        .map_err(|e| uart_error("transmit", e))?;
    }

    tx.close().map_err(|e| uart_error("closing tx pin", e))?;
    info!("transmitter done");
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: SendArgs, _format: OutputFormat) -> crate::exit::CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::INTERNAL,
        "the bench tool drives Raspberry Pi GPIO and only runs on linux",
    ))
}

/// One pass of the transmit cycle: assemble the current message, hand
/// it to the transmitter, echo it, wait for the line to drain, then
/// advance the table position. A failed pass leaves the position where
/// it was.
fn trigger<S: FrameSink>(
    sink: &mut S,
    cycle: &mut MessageCycle,
    cfg: &LinkConfig,
    mut echo: impl FnMut(&[u8]),
) -> Result<(), UartError> {
    let frame = assemble(MESSAGES[cycle.current()]);
    sink.transmit(&frame)?;
    echo(&frame);
    let symbols = frame.len() / cfg.bytes_per_symbol();
    sink.wait_idle(cfg.frame_duration(symbols) + DRAIN_MARGIN)?;
    cycle.advance();
    Ok(())
}

/// Position in the fixed message table. Advances with wraparound; the
/// table itself is never touched.
struct MessageCycle {
    next: usize,
    len: usize,
}

impl MessageCycle {
    fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    fn current(&self) -> usize {
        self.next
    }

    fn advance(&mut self) {
        self.next = (self.next + 1) % self.len;
    }
}

/// Seam between the transmit cycle and the UART capability.
trait FrameSink {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), UartError>;
    fn wait_idle(&mut self, timeout: Duration) -> Result<(), UartError>;
}

impl<P: TxPin + 'static> FrameSink for SoftUartTx<P> {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), UartError> {
        SoftUartTx::transmit(self, frame)
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<(), UartError> {
        SoftUartTx::wait_idle(self, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockSink {
        frames: Vec<Vec<u8>>,
        waits: usize,
        fail_transmit: bool,
    }

    impl FrameSink for MockSink {
        fn transmit(&mut self, frame: &[u8]) -> Result<(), UartError> {
            if self.fail_transmit {
                return Err(UartError::NotOpen { pin: 24 });
            }
            self.frames.push(frame.to_vec());
            Ok(())
        }

        fn wait_idle(&mut self, _timeout: Duration) -> Result<(), UartError> {
            self.waits += 1;
            Ok(())
        }
    }

    fn fire(sink: &mut MockSink, cycle: &mut MessageCycle, times: usize) {
        let cfg = LinkConfig::default();
        for _ in 0..times {
            trigger(sink, cycle, &cfg, |_| {}).expect("trigger should succeed");
        }
    }

    #[test]
    fn interleaves_even_parity_after_each_byte() {
        let mut sink = MockSink::default();
        let mut cycle = MessageCycle::new(MESSAGES.len());
        fire(&mut sink, &mut cycle, 1);
        // "LF\r": every byte has an odd popcount.
        assert_eq!(sink.frames[0], vec![0x4C, 1, 0x46, 1, 0x0D, 1]);
    }

    #[test]
    fn four_triggers_wrap_back_to_the_first_message() {
        let mut sink = MockSink::default();
        let mut cycle = MessageCycle::new(MESSAGES.len());
        fire(&mut sink, &mut cycle, 4);
        assert_eq!(cycle.current(), 0);
        fire(&mut sink, &mut cycle, 1);
        assert_eq!(cycle.current(), 1);
    }

    #[test]
    fn second_cycle_reproduces_the_first_byte_for_byte() {
        let mut sink = MockSink::default();
        let mut cycle = MessageCycle::new(MESSAGES.len());
        fire(&mut sink, &mut cycle, 8);

        let lengths: Vec<usize> = sink.frames.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![6, 4, 4, 6, 6, 4, 4, 6]);
        assert_eq!(sink.frames[..4], sink.frames[4..]);
        assert_eq!(sink.waits, 8);
    }

    #[test]
    fn echoes_the_assembled_frame_once_per_trigger() {
        let mut sink = MockSink::default();
        let mut cycle = MessageCycle::new(MESSAGES.len());
        let mut echoed = Vec::new();
        trigger(&mut sink, &mut cycle, &LinkConfig::default(), |frame| {
            echoed.push(frame.to_vec());
        })
        .unwrap();
        assert_eq!(echoed, sink.frames);
    }

    #[test]
    fn failed_transmit_does_not_advance_the_cycle() {
        let mut sink = MockSink {
            fail_transmit: true,
            ..MockSink::default()
        };
        let mut cycle = MessageCycle::new(MESSAGES.len());
        let result = trigger(&mut sink, &mut cycle, &LinkConfig::default(), |_| {});
        assert!(matches!(result, Err(UartError::NotOpen { .. })));
        assert_eq!(cycle.current(), 0);
        assert_eq!(sink.waits, 0);
    }
}
