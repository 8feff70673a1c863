//! Trace event masks and the command-line flags that select them.
//!
//! See [`sqlite3_trace_v2`](https://sqlite.org/c3ref/trace_v2.html)
//! and the [trace event codes](https://sqlite.org/c3ref/c_trace.html).

use std::fmt;
use std::ops::BitOr;

use clap::Args;
use rusqlite::ffi;
use serde::Serialize;

/// Bitmask selecting which trace events a connection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TraceMask(u32);

impl TraceMask {
    /// No events.
    pub const NONE: Self = Self(0);

    /// A prepared statement first begins running (also each trigger subprogram).
    pub const STMT: Self = Self(ffi::SQLITE_TRACE_STMT as u32);

    /// A prepared statement finished; carries the estimated run time.
    pub const PROFILE: Self = Self(ffi::SQLITE_TRACE_PROFILE as u32);

    /// A statement produced one row of result.
    ///
    /// Fires for every row, which gets noisy on large result sets.
    pub const ROW: Self = Self(ffi::SQLITE_TRACE_ROW as u32);

    /// The database connection closes.
    pub const CLOSE: Self = Self(ffi::SQLITE_TRACE_CLOSE as u32);

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl fmt::LowerHex for TraceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

const STMT_ARG: &str = "trace-stmt";
const PROFILE_ARG: &str = "trace-profile";
const ROW_ARG: &str = "trace-row";
const CLOSE_ARG: &str = "trace-close";

/// Which trace event categories are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraceMaskConfig {
    pub stmt: bool,
    pub profile: bool,
    pub row: bool,
    pub close: bool,
}

impl TraceMaskConfig {
    /// Build a config from the short form (`s`, `p`, `r`, `c`).
    #[must_use]
    pub fn from_short_form(codes: &str) -> Self {
        let mut config = Self::default();
        config.apply_short_form(codes);
        config
    }

    /// Enable every category named in `codes`; unknown characters are ignored.
    pub fn apply_short_form(&mut self, codes: &str) {
        for c in codes.chars() {
            match c {
                's' => self.stmt = true,
                'p' => self.profile = true,
                'r' => self.row = true,
                'c' => self.close = true,
                _ => {}
            }
        }
    }

    #[must_use]
    pub fn short_form(&self) -> String {
        self.enabled()
            .map(|(code, _, _)| code)
            .collect()
    }

    /// The separate boolean flags that would select this config, e.g.
    /// `--trace-stmt --trace-row`. Empty when nothing is enabled.
    #[must_use]
    pub fn long_flags(&self) -> String {
        self.enabled()
            .map(|(_, arg, _)| format!("--{arg}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn event_mask(&self) -> TraceMask {
        self.enabled()
            .fold(TraceMask::NONE, |mask, (_, _, bit)| mask | bit)
    }

    fn enabled(&self) -> impl Iterator<Item = (char, &'static str, TraceMask)> {
        [
            (self.stmt, 's', STMT_ARG, TraceMask::STMT),
            (self.profile, 'p', PROFILE_ARG, TraceMask::PROFILE),
            (self.row, 'r', ROW_ARG, TraceMask::ROW),
            (self.close, 'c', CLOSE_ARG, TraceMask::CLOSE),
        ]
        .into_iter()
        .filter(|(on, ..)| *on)
        .map(|(_, code, arg, bit)| (code, arg, bit))
    }
}

impl From<TraceMaskConfig> for TraceMask {
    fn from(config: TraceMaskConfig) -> Self {
        config.event_mask()
    }
}

/// Trace flags for binaries to `#[command(flatten)]` into their parser.
///
/// Help texts follow the SQLite 3.14 documentation for `sqlite3_trace_v2()`.
#[derive(Args, Debug, Clone, Default)]
pub struct TraceMaskArgs {
    /// Event: statement first begins running, possibly the start of each trigger subprogram
    #[arg(long = STMT_ARG)]
    pub trace_stmt: bool,
    /// Event: statement finishes, gives estimated number of nanoseconds it took to run
    #[arg(long = PROFILE_ARG)]
    pub trace_profile: bool,
    /// Event: a statement generates a single row of result
    #[arg(long = ROW_ARG)]
    pub trace_row: bool,
    /// Event: database connection closes
    #[arg(long = CLOSE_ARG)]
    pub trace_close: bool,
    /// Supported SQLite trace event codes: s=Stmt, p=Profile, r=Row, c=Close
    #[arg(long, default_value = "")]
    pub trace_mask: String,
}

impl TraceMaskArgs {
    /// Union of the boolean flags and the short-form string.
    #[must_use]
    pub fn to_config(&self) -> TraceMaskConfig {
        let mut config = TraceMaskConfig {
            stmt: self.trace_stmt,
            profile: self.trace_profile,
            row: self.trace_row,
            close: self.trace_close,
        };
        config.apply_short_form(&self.trace_mask);
        config
    }
}
