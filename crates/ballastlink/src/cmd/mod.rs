use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

/// Transmit pin (BCM), shared with the programming-header MOSI.
pub const TX_PIN: u8 = 24;
/// Receive pin (BCM), shared with the programming-header MISO.
pub const RX_PIN: u8 = 25;
/// Link rate used by both ends.
pub const BAUD_RATE: u32 = 2400;
/// Data bits per symbol: 8 data + 1 even parity.
pub const SYMBOL_BITS: u8 = 9;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transmit the fixed test messages, one per operator prompt.
    Send(SendArgs),
    /// Listen on the RX pin and print received bytes in hex.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {}

#[derive(Args, Debug, Default)]
pub struct ListenArgs {
    /// Exit after printing N batches of received bytes.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build and link information.
    #[arg(long)]
    pub extended: bool,
}
