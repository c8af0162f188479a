//! Session state machine and the per-cycle driver.

use std::io::Write;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use log::{debug, info, warn};

use crate::console::command::{interpret, Action};
use crate::console::error::LinkError;
use crate::console::input::KeySource;
use crate::console::lines::{LineHistory, LineSnapshot};
use crate::console::render::render;

/// Delay between reconnect attempts while the link is down.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// The cycle driver's view of the serial link.
///
/// [`SerialConnection`](crate::serial::SerialConnection) is the hardware
/// implementation; tests drive cycles against an in-memory fake.
pub trait ConsolePort {
    /// Number of bytes queued for reading right now. Zero-timeout.
    fn bytes_available(&mut self) -> Result<u32, LinkError>;

    /// Read a single queued byte. Only called after `bytes_available`
    /// reported data.
    fn read_byte(&mut self) -> Result<u8, LinkError>;

    /// Observe all five control lines, each exactly once.
    fn sample_lines(&mut self) -> Result<LineSnapshot, LinkError>;

    fn write_rts(&mut self, level: bool) -> Result<(), LinkError>;

    fn write_dtr(&mut self, level: bool) -> Result<(), LinkError>;
}

/// Connection lifecycle. Dropping the `Connected` payload releases the
/// device.
enum LinkState<P> {
    Disconnected,
    Connected(P),
}

/// Whether the loop keeps running after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    Exit,
}

/// All mutable session state: the link, the last observed control-line
/// values, and the last consumed keystroke. Single owner, no globals; the
/// whole struct is dropped when the operator exits.
pub struct Session<P> {
    link: LinkState<P>,
    history: LineHistory,
    pending: Option<char>,
}

impl<P: ConsolePort> Session<P> {
    pub fn new() -> Self {
        Self {
            link: LinkState::Disconnected,
            history: LineHistory::default(),
            pending: None,
        }
    }

    /// Drive the console until the operator confirms exit.
    ///
    /// `open` is attempted whenever the link is down; every fault inside a
    /// cycle collapses the link back to disconnected and is retried after
    /// [`RECONNECT_BACKOFF`], without operator intervention. Only the
    /// operator's confirmed exit leaves this loop.
    pub fn run(
        &mut self,
        mut open: impl FnMut() -> Result<P, LinkError>,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
    ) {
        loop {
            let Some(port) = Self::ensure_connected(&mut self.link, &mut open) else {
                thread::sleep(RECONNECT_BACKOFF);
                continue;
            };

            match Self::run_cycle(port, &mut self.history, &mut self.pending, keys, out) {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::Exit) => {
                    println!("{}", "Exiting...".yellow());
                    // Releases the handle before the loop stops.
                    self.link = LinkState::Disconnected;
                    return;
                }
                Err(err) => {
                    warn!("serial link lost: {}", err);
                    println!("{}", "Can't open serial...".yellow());
                    self.link = LinkState::Disconnected;
                    thread::sleep(RECONNECT_BACKOFF);
                }
            }
        }
    }

    /// Open the link if it is down. Returns the live port, or `None` when
    /// the open attempt failed and the session stays disconnected (the
    /// caller applies the backoff).
    fn ensure_connected<'a>(
        link: &'a mut LinkState<P>,
        open: &mut dyn FnMut() -> Result<P, LinkError>,
    ) -> Option<&'a mut P> {
        if let LinkState::Disconnected = link {
            match open() {
                Ok(port) => {
                    info!("serial link established");
                    println!("{}", "Got serial.".green());
                    *link = LinkState::Connected(port);
                }
                Err(err) => {
                    debug!("open failed: {}", err);
                    println!("{}", "Can't open serial...".yellow());
                }
            }
        }

        match link {
            LinkState::Connected(port) => Some(port),
            LinkState::Disconnected => None,
        }
    }

    /// One loop iteration over a live port, in fixed order: report line
    /// transitions, drain every byte queued right now, then service at most
    /// one pending keystroke.
    ///
    /// Draining before the keyboard check keeps a serial burst contiguous on
    /// screen instead of interleaving it with keystroke handling; the drain
    /// loop is bounded by "is there more data queued right now", so the
    /// keyboard waits at most one cycle.
    fn run_cycle(
        port: &mut P,
        history: &mut LineHistory,
        pending: &mut Option<char>,
        keys: &mut dyn KeySource,
        out: &mut dyn Write,
    ) -> Result<CycleOutcome, LinkError> {
        let snapshot = port.sample_lines()?;
        for change in history.diff_and_update(&snapshot) {
            writeln!(out, "{}: {}", change.line.to_string().cyan(), change.level)
                .map_err(LinkError::Output)?;
        }

        while port.bytes_available()? > 0 {
            let byte = port.read_byte()?;
            out.write_all(render(byte).as_bytes())
                .map_err(LinkError::Output)?;
            out.flush().map_err(LinkError::Output)?;
        }

        if keys.ready().map_err(LinkError::Input)? {
            if let Some(key) = keys.read_key().map_err(LinkError::Input)? {
                let action = interpret(key, *pending);
                *pending = Some(key);
                match action {
                    Action::ToggleRts => {
                        let level = !snapshot.rts;
                        port.write_rts(level)?;
                        debug!("RTS driven {}", level);
                    }
                    Action::ToggleDtr => {
                        let level = !snapshot.dtr;
                        port.write_dtr(level)?;
                        debug!("DTR driven {}", level);
                    }
                    Action::RequestExit => return Ok(CycleOutcome::Exit),
                    Action::NoOp => {}
                }
            }
        }

        Ok(CycleOutcome::Continue)
    }
}

impl<P: ConsolePort> Default for Session<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::io;

    /// In-memory port that records the order of every operation.
    struct FakePort {
        rx: VecDeque<u8>,
        snapshot: LineSnapshot,
        fail_sample: bool,
        events: Vec<String>,
    }

    impl FakePort {
        fn new() -> Self {
            Self {
                rx: VecDeque::new(),
                snapshot: LineSnapshot::default(),
                fail_sample: false,
                events: Vec::new(),
            }
        }

        fn with_rx(bytes: &[u8]) -> Self {
            let mut port = Self::new();
            port.rx.extend(bytes);
            port
        }
    }

    impl ConsolePort for FakePort {
        fn bytes_available(&mut self) -> Result<u32, LinkError> {
            Ok(self.rx.len() as u32)
        }

        fn read_byte(&mut self) -> Result<u8, LinkError> {
            let byte = self.rx.pop_front().ok_or_else(|| {
                LinkError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "empty"))
            })?;
            self.events.push(format!("read {:#04x}", byte));
            Ok(byte)
        }

        fn sample_lines(&mut self) -> Result<LineSnapshot, LinkError> {
            if self.fail_sample {
                return Err(LinkError::Line(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "gone",
                )));
            }
            self.events.push("sample".to_string());
            Ok(self.snapshot)
        }

        fn write_rts(&mut self, level: bool) -> Result<(), LinkError> {
            self.snapshot.rts = level;
            self.events.push(format!("rts {}", level));
            Ok(())
        }

        fn write_dtr(&mut self, level: bool) -> Result<(), LinkError> {
            self.snapshot.dtr = level;
            self.events.push(format!("dtr {}", level));
            Ok(())
        }
    }

    /// Keystrokes from a canned script.
    struct ScriptedKeys {
        keys: VecDeque<char>,
    }

    impl ScriptedKeys {
        fn new(keys: &str) -> Self {
            Self {
                keys: keys.chars().collect(),
            }
        }
    }

    impl KeySource for ScriptedKeys {
        fn ready(&mut self) -> io::Result<bool> {
            Ok(!self.keys.is_empty())
        }

        fn read_key(&mut self) -> io::Result<Option<char>> {
            Ok(self.keys.pop_front())
        }
    }

    fn cycle(
        port: &mut FakePort,
        history: &mut LineHistory,
        pending: &mut Option<char>,
        keys: &mut ScriptedKeys,
        out: &mut Vec<u8>,
    ) -> Result<CycleOutcome, LinkError> {
        Session::run_cycle(port, history, pending, keys, out)
    }

    #[test]
    fn serial_burst_is_drained_before_the_keystroke() {
        let mut port = FakePort::with_rx(b"hello");
        let mut keys = ScriptedKeys::new("r");
        let mut history = LineHistory::default();
        let mut pending = None;
        let mut out = Vec::new();

        let outcome = cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();

        assert_eq!(outcome, CycleOutcome::Continue);
        assert!(port.rx.is_empty(), "all queued bytes must be drained");
        assert_eq!(pending, Some('r'));
        // Every read precedes the RTS write triggered by the keystroke.
        let rts_at = port.events.iter().position(|e| e.starts_with("rts")).unwrap();
        for (i, event) in port.events.iter().enumerate() {
            if event.starts_with("read") {
                assert!(i < rts_at, "byte {} serviced after the keystroke", event);
            }
        }
        assert!(String::from_utf8(out).unwrap().ends_with("hello"));
    }

    #[test]
    fn bytes_render_in_arrival_order() {
        let mut port = FakePort::with_rx(&[b'o', b'k', 0xff, b'!']);
        let mut keys = ScriptedKeys::new("");
        let mut out = Vec::new();

        cycle(
            &mut port,
            &mut LineHistory::default(),
            &mut None,
            &mut keys,
            &mut out,
        )
        .unwrap();

        assert!(String::from_utf8(out).unwrap().ends_with("ok\\xff!"));
    }

    #[test]
    fn toggle_writes_negation_of_last_observed_level() {
        let mut port = FakePort::new();
        port.snapshot.rts = true;
        port.snapshot.dtr = false;
        let mut history = LineHistory::default();
        let mut pending = None;
        let mut out = Vec::new();

        let mut keys = ScriptedKeys::new("r");
        cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();
        assert!(port.events.contains(&"rts false".to_string()));

        let mut keys = ScriptedKeys::new("d");
        cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();
        assert!(port.events.contains(&"dtr true".to_string()));
    }

    #[test]
    fn toggled_line_is_reported_on_the_next_cycle() {
        let mut port = FakePort::new();
        let mut history = LineHistory::default();
        let mut pending = None;
        let mut out = Vec::new();

        let mut keys = ScriptedKeys::new("r");
        cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();

        out.clear();
        let mut keys = ScriptedKeys::new("");
        cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("RTS"), "toggle must surface as a change report");
    }

    #[test]
    fn decode_fallback_does_not_abort_the_cycle() {
        let mut port = FakePort::with_rx(&[0xfe, 0xff]);
        let mut out = Vec::new();

        let outcome = cycle(
            &mut port,
            &mut LineHistory::default(),
            &mut None,
            &mut ScriptedKeys::new(""),
            &mut out,
        )
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Continue);
        assert!(String::from_utf8(out).unwrap().contains("\\xfe\\xff"));
    }

    #[test]
    fn exit_on_first_newline_of_the_session() {
        let mut port = FakePort::new();
        let mut keys = ScriptedKeys::new("\n");
        let outcome = cycle(
            &mut port,
            &mut LineHistory::default(),
            &mut None,
            &mut keys,
            &mut Vec::new(),
        )
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Exit);
    }

    #[test]
    fn exit_needs_confirmation_after_other_input() {
        let mut port = FakePort::new();
        let mut history = LineHistory::default();
        let mut pending = None;
        let mut out = Vec::new();

        for (key, expected) in [
            ('x', CycleOutcome::Continue),
            ('\n', CycleOutcome::Continue),
            ('\n', CycleOutcome::Exit),
        ] {
            let mut keys = ScriptedKeys::new(&key.to_string());
            let outcome =
                cycle(&mut port, &mut history, &mut pending, &mut keys, &mut out).unwrap();
            assert_eq!(outcome, expected, "after key {:?}", key);
        }
    }

    #[test]
    fn link_fault_surfaces_as_error_not_panic() {
        let mut port = FakePort::new();
        port.fail_sample = true;

        let result = cycle(
            &mut port,
            &mut LineHistory::default(),
            &mut None,
            &mut ScriptedKeys::new(""),
            &mut Vec::new(),
        );

        assert!(matches!(result, Err(LinkError::Line(_))));
    }

    #[test]
    fn ensure_connected_retries_until_open_succeeds() {
        let attempts = Cell::new(0u32);
        let mut open = || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(LinkError::Open {
                    port: "/dev/ttyUSB0".to_string(),
                    source: serialport::Error::new(serialport::ErrorKind::NoDevice, "missing"),
                })
            } else {
                Ok(FakePort::new())
            }
        };

        let mut link: LinkState<FakePort> = LinkState::Disconnected;
        assert!(Session::ensure_connected(&mut link, &mut open).is_none());
        assert!(Session::ensure_connected(&mut link, &mut open).is_none());
        assert!(Session::ensure_connected(&mut link, &mut open).is_some());
        assert_eq!(attempts.get(), 3);

        // A held link is reused, not reopened.
        assert!(Session::ensure_connected(&mut link, &mut open).is_some());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn run_stops_only_on_operator_exit() {
        let mut session: Session<FakePort> = Session::new();
        let mut keys = ScriptedKeys::new("\n");
        let mut out = Vec::new();

        session.run(|| Ok(FakePort::with_rx(b"boot")), &mut keys, &mut out);

        let text = String::from_utf8(out).unwrap();
        // First cycle reports all five lines, drains the buffer, then the
        // first-keystroke newline ends the session.
        assert!(text.contains("CTS"));
        assert!(text.ends_with("boot"));
        assert!(matches!(session.link, LinkState::Disconnected));
    }
}
