use std::borrow::Cow;
use std::fmt;

use rusqlite::ffi;

use crate::mask::TraceMask;

/// Error state of the connection at the time an event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbErrorCode {
    pub code: i32,
    pub extended_code: i32,
}

impl DbErrorCode {
    /// `None` unless at least one of the codes is nonzero.
    #[must_use]
    pub fn from_codes(code: i32, extended_code: i32) -> Option<Self> {
        if code == 0 && extended_code == 0 {
            None
        } else {
            Some(Self {
                code,
                extended_code,
            })
        }
    }
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code {}, extended code {})",
            ffi::code_to_str(self.extended_code),
            self.code,
            self.extended_code
        )
    }
}

/// One trace event, borrowed from SQLite for the duration of the callback.
#[derive(Debug, Clone)]
pub struct TraceInfo<'a> {
    pub event: TraceMask,
    pub conn_handle: usize,
    /// Zero for connection-close events.
    pub stmt_handle: usize,
    /// Unexpanded statement text, or `-- <trigger>` for trigger subprograms.
    pub stmt_or_trigger: Cow<'a, str>,
    pub expanded_sql: Option<String>,
    pub run_time_ns: i64,
    pub db_error: Option<DbErrorCode>,
}

impl fmt::Display for TraceInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Curly braces delimit the statement text; stray braces in driver-level
        // SQL usually mean unexpanded template syntax upstream.
        write!(
            f,
            "Trace: ev 0x{:x}, conn 0x{:x}, stmt 0x{:x} {{{:?}}}",
            self.event, self.conn_handle, self.stmt_handle, self.stmt_or_trigger
        )?;
        match &self.expanded_sql {
            Some(expanded) if expanded.as_str() == self.stmt_or_trigger.as_ref() => {
                f.write_str(" no change when expanded")?;
            }
            Some(expanded) => write!(f, " expanded {{{expanded:?}}}")?,
            None => {}
        }
        write!(f, "; {} ns", self.run_time_ns)?;
        match &self.db_error {
            Some(err) => write!(f, "; DB error: {err}"),
            None => f.write_str("."),
        }
    }
}
