use crate::cmd::{VersionArgs, BAUD_RATE, RX_PIN, SYMBOL_BITS, TX_PIN};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ballastlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ballastlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("tx pin: {TX_PIN} (BCM)");
    println!("rx pin: {RX_PIN} (BCM)");
    println!("link: {BAUD_RATE} baud, {SYMBOL_BITS} data bits, even parity folded into bit 8");

    Ok(SUCCESS)
}
