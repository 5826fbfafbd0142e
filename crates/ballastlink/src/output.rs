use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Render bytes the way the bench scripts always have: lowercase hex,
/// no zero padding, comma-separated, in brackets.
pub fn hex_dump(bytes: &[u8]) -> String {
    let body = bytes
        .iter()
        .map(|b| format!("{b:#x}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{body}]")
}

#[derive(Serialize)]
struct ByteDump<'a> {
    direction: &'a str,
    count: usize,
    bytes: &'a [u8],
    hex: String,
    timestamp: String,
}

/// Print one dump line for `bytes` to stdout.
pub fn print_bytes(direction: &str, bytes: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", hex_dump(bytes)),
        OutputFormat::Json => {
            let out = ByteDump {
                direction,
                count: bytes.len(),
                bytes,
                hex: hex_dump(bytes),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
