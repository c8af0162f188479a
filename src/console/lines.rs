//! Control-line snapshots and transition detection.

use std::fmt;

/// Hardware handshaking lines on a serial interface.
///
/// CTS, DCD and DSR are inputs from the device; RTS and DTR are outputs
/// driven by this tool (commonly wired to a microcontroller's reset/boot
/// strapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    Cts,
    Dcd,
    Dsr,
    Rts,
    Dtr,
}

/// Fixed sampling and reporting order for every cycle.
pub const LINE_ORDER: [ControlLine; 5] = [
    ControlLine::Cts,
    ControlLine::Dcd,
    ControlLine::Dsr,
    ControlLine::Rts,
    ControlLine::Dtr,
];

impl fmt::Display for ControlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlLine::Cts => "CTS",
            ControlLine::Dcd => "DCD",
            ControlLine::Dsr => "DSR",
            ControlLine::Rts => "RTS",
            ControlLine::Dtr => "DTR",
        };
        write!(f, "{}", name)
    }
}

/// All five line values observed at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSnapshot {
    pub cts: bool,
    pub dcd: bool,
    pub dsr: bool,
    pub rts: bool,
    pub dtr: bool,
}

impl LineSnapshot {
    pub fn get(&self, line: ControlLine) -> bool {
        match line {
            ControlLine::Cts => self.cts,
            ControlLine::Dcd => self.dcd,
            ControlLine::Dsr => self.dsr,
            ControlLine::Rts => self.rts,
            ControlLine::Dtr => self.dtr,
        }
    }
}

/// One reported transition: a line and the value it changed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    pub line: ControlLine,
    pub level: bool,
}

/// Last observed value per line.
///
/// `None` means "never observed", so the first real reading of each line is
/// always reported once. An explicit marker rather than defaulting to
/// `false`: a line that starts out low must still produce its first report.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineHistory {
    cts: Option<bool>,
    dcd: Option<bool>,
    dsr: Option<bool>,
    rts: Option<bool>,
    dtr: Option<bool>,
}

impl LineHistory {
    fn get(&self, line: ControlLine) -> Option<bool> {
        match line {
            ControlLine::Cts => self.cts,
            ControlLine::Dcd => self.dcd,
            ControlLine::Dsr => self.dsr,
            ControlLine::Rts => self.rts,
            ControlLine::Dtr => self.dtr,
        }
    }

    fn set(&mut self, line: ControlLine, level: bool) {
        let slot = match line {
            ControlLine::Cts => &mut self.cts,
            ControlLine::Dcd => &mut self.dcd,
            ControlLine::Dsr => &mut self.dsr,
            ControlLine::Rts => &mut self.rts,
            ControlLine::Dtr => &mut self.dtr,
        };
        *slot = Some(level);
    }

    /// Compare a fresh snapshot against the stored history, in [`LINE_ORDER`],
    /// recording every line whose value differs from the last observation
    /// (or that was never observed). Updates the history for all five lines
    /// regardless of whether they changed.
    pub fn diff_and_update(&mut self, snapshot: &LineSnapshot) -> Vec<LineChange> {
        let mut changes = Vec::new();
        for line in LINE_ORDER {
            let level = snapshot.get(line);
            if self.get(line) != Some(level) {
                changes.push(LineChange { line, level });
            }
            self.set(line, level);
        }
        changes
    }
}
