//! Serial Console
//!
//! An interactive serial-line console for device bring-up and debugging.
//! Streams device output to the terminal, reports handshaking-line
//! transitions as they happen, and maps keystrokes to RTS/DTR toggles so
//! the operator can drive a device's reset/boot sequence by hand.
//!
//! # Usage
//!
//! ```bash
//! # List available serial ports
//! serial-console --list
//!
//! # Open a console (baud defaults to 460800)
//! serial-console /dev/ttyUSB0
//! serial-console /dev/ttyUSB0 115200
//! ```
//!
//! Keys: `r` toggles RTS, `d` toggles DTR, Enter pressed twice (or as the
//! very first keystroke) exits. On many ESP32 boards RTS asserted with DTR
//! released holds the chip in reset.

mod console;
mod serial;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::info;

use console::input::StdinKeys;
use console::Session;
use serial::{PortConfig, SerialConnection, DEFAULT_BAUD};

/// Interactive serial console with control-line monitoring
#[derive(Parser)]
#[command(name = "serial-console")]
#[command(version)]
#[command(about = "Interactive serial console with control-line monitoring")]
struct Cli {
    /// Serial port path (e.g., /dev/ttyUSB0)
    #[arg(required_unless_present = "list")]
    port: Option<String>,

    /// Baud rate
    #[arg(default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.list {
        return serial::port::print_ports();
    }

    let Some(port_path) = cli.port else {
        // clap enforces PORT unless --list was given
        anyhow::bail!("PORT is required");
    };

    let config = PortConfig::new(&port_path).with_baud_rate(cli.baud);
    info!("console on {} at {} baud", config.port_path, config.baud_rate);

    let mut session = Session::new();
    let mut keys = StdinKeys;
    let mut stdout = std::io::stdout();

    session.run(
        || {
            println!("{} {}", "Trying".cyan(), config.port_path.white().bold());
            SerialConnection::open(&config)
        },
        &mut keys,
        &mut stdout,
    );

    Ok(())
}
