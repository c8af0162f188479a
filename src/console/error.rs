//! Recoverable fault category for the serial link.

use thiserror::Error;

/// A fault on the serial link or the console's I/O around it.
///
/// There is no distinction between "device unplugged" and "device
/// misbehaving": every variant funnels into the same reconnect path, where
/// the session drops the handle and retries the open on later cycles. Usage
/// errors (a missing port argument) are a separate startup-phase failure and
/// never appear here.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("control line access failed: {0}")]
    Line(#[source] serialport::Error),

    #[error("operator input failed: {0}")]
    Input(#[source] std::io::Error),

    #[error("console output failed: {0}")]
    Output(#[source] std::io::Error),
}
