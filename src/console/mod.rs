//! Event-multiplexing core of the console.
//!
//! One single-threaded loop interleaves three asynchronous concerns over a
//! shared serial handle:
//! - reconnecting the link across transient open failures,
//! - diffing the five handshaking lines and reporting transitions,
//! - draining device bytes and servicing operator keystrokes, neither of
//!   which is allowed to block the other.
//!
//! All mutable state lives in [`Session`]; every I/O fault inside the loop
//! collapses to the same reconnect path and never terminates the process.

pub mod command;
pub mod error;
pub mod input;
pub mod lines;
pub mod render;
pub mod session;

pub use error::LinkError;
pub use session::{ConsolePort, Session};
