//! Serial port access for the console.
//!
//! This module provides functionality for:
//! - Listing available serial ports (USB-to-serial adapters)
//! - Opening and owning the byte-oriented connection to the device
//! - Reading and driving the hardware handshaking lines

pub mod port;

pub use port::{PortConfig, SerialConnection, DEFAULT_BAUD};
