//! Serial port configuration and connection management
//!
//! Handles USB serial port discovery and the exclusively-owned connection
//! the console session polls each cycle.

use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::time::Duration;

use crate::console::lines::LineSnapshot;
use crate::console::{ConsolePort, LinkError};

/// Default baud rate when none is given on the command line.
pub const DEFAULT_BAUD: u32 = 460_800;

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An opened, exclusively-owned serial connection.
///
/// RTS and DTR are output lines: the OS does not report the driven level
/// back, so the connection caches the last level it wrote and the line
/// snapshot reads that cache. Both lines are asserted at open, so their
/// first observation is reported and toggles start from a known level.
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    rts: bool,
    dtr: bool,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration.
    ///
    /// Hardware flow control stays off: the session drives RTS by hand to
    /// control the attached device's reset/boot strapping.
    pub fn open(config: &PortConfig) -> Result<Self, LinkError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: config.port_path.clone(),
                source,
            })?;

        let mut conn = Self {
            port,
            rts: false,
            dtr: false,
        };
        conn.set_rts(true)?;
        conn.set_dtr(true)?;
        Ok(conn)
    }

    /// Drive the RTS (Request To Send) line
    pub fn set_rts(&mut self, level: bool) -> Result<(), LinkError> {
        self.port
            .write_request_to_send(level)
            .map_err(LinkError::Line)?;
        self.rts = level;
        Ok(())
    }

    /// Drive the DTR (Data Terminal Ready) line
    pub fn set_dtr(&mut self, level: bool) -> Result<(), LinkError> {
        self.port
            .write_data_terminal_ready(level)
            .map_err(LinkError::Line)?;
        self.dtr = level;
        Ok(())
    }
}

impl ConsolePort for SerialConnection {
    fn bytes_available(&mut self) -> Result<u32, LinkError> {
        self.port.bytes_to_read().map_err(LinkError::Line)
    }

    fn read_byte(&mut self) -> Result<u8, LinkError> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            // Only called with data queued; anything else is a link fault.
            Ok(_) => Err(LinkError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port returned no data",
            ))),
            Err(e) => Err(LinkError::Read(e)),
        }
    }

    fn sample_lines(&mut self) -> Result<LineSnapshot, LinkError> {
        Ok(LineSnapshot {
            cts: self.port.read_clear_to_send().map_err(LinkError::Line)?,
            dcd: self.port.read_carrier_detect().map_err(LinkError::Line)?,
            dsr: self.port.read_data_set_ready().map_err(LinkError::Line)?,
            rts: self.rts,
            dtr: self.dtr,
        })
    }

    fn write_rts(&mut self, level: bool) -> Result<(), LinkError> {
        self.set_rts(level)
    }

    fn write_dtr(&mut self, level: bool) -> Result<(), LinkError> {
        self.set_dtr(level)
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    let port_infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => {
                    (PortType::PciSerial, None, None, None, None, None)
                }
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    (PortType::Unknown, None, None, None, None, None)
                }
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect();

    Ok(port_infos)
}

/// Print formatted list of available serial ports
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect a USB-to-serial adapter");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in ports {
        println!("\n{}: {}", "Port".cyan(), port.path.white().bold());
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let Some(ref sn) = port.serial_number {
            println!("  Serial: {}", sn);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{}",
        "Use: serial-console <PORT> [BAUD] to open a console".yellow()
    );

    Ok(())
}
