use std::fmt;
use std::io;

use ballastlink_uart::UartError;

// Exit codes, kept in the sysexits-adjacent ranges the rest of our
// tooling expects.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const HARDWARE_ERROR: i32 = 3;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}

pub fn uart_error(context: &str, err: UartError) -> CliError {
    let code = match &err {
        #[cfg(target_os = "linux")]
        UartError::Gpio { .. } => HARDWARE_ERROR,
        UartError::InvalidBaud { .. }
        | UartError::InvalidDataBits { .. }
        | UartError::TruncatedSymbol { .. } => USAGE,
        UartError::TxTimeout { .. } => TIMEOUT,
        UartError::Busy { .. } => FAILURE,
        UartError::NotOpen { .. }
        | UartError::AlreadyOpen { .. }
        | UartError::Spawn { .. }
        | UartError::WorkerGone { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_the_timeout_exit_code() {
        let err = uart_error(
            "transmit",
            UartError::TxTimeout {
                pin: 24,
                timeout: std::time::Duration::from_millis(10),
            },
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("transmit: "));
    }

    #[test]
    fn config_errors_map_to_usage() {
        let err = uart_error(
            "link config",
            UartError::InvalidBaud {
                baud: 10,
                min: 50,
                max: 250_000,
            },
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn lifecycle_bugs_map_to_internal() {
        let err = uart_error("poll", UartError::NotOpen { pin: 25 });
        assert_eq!(err.code, INTERNAL);
    }
}
