//! Non-blocking operator input.

use std::io::{self, Read};

/// Source of operator keystrokes with a zero-timeout readiness check.
///
/// The session only reads after `ready` reported input, so neither source
/// of the multiplexer can block the other. Tests substitute a scripted
/// implementation.
pub trait KeySource {
    /// Report, without blocking, whether a keystroke can be read.
    fn ready(&mut self) -> io::Result<bool>;

    /// Read one keystroke. `None` means the stream has ended.
    fn read_key(&mut self) -> io::Result<Option<char>>;
}

/// Keystrokes from the process's standard input.
///
/// The terminal stays in its normal line-buffered mode, so keystrokes become
/// visible to the poll once the operator presses Enter.
pub struct StdinKeys;

impl KeySource for StdinKeys {
    fn ready(&mut self) -> io::Result<bool> {
        stdin_ready()
    }

    fn read_key(&mut self) -> io::Result<Option<char>> {
        let mut byte = [0u8; 1];
        match io::stdin().read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0] as char)),
        }
    }
}

/// Zero-timeout readiness poll on stdin.
#[cfg(unix)]
fn stdin_ready() -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // Timeout of 0: report and return immediately.
    let rc = unsafe { libc::poll(&mut fds, 1, 0) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc > 0 && fds.revents & libc::POLLIN != 0)
}

/// Fallback for platforms without `poll`: stdin is never reported ready, so
/// the console still streams serial output but ignores the keyboard.
#[cfg(not(unix))]
fn stdin_ready() -> io::Result<bool> {
    Ok(false)
}
