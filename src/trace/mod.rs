//! SQLite trace events: the per-event record handed to callbacks and the
//! `sqlite3_trace_v2` registration behind [`TracedConnection`](crate::TracedConnection).

mod event;
pub(crate) mod hook;

pub use event::{DbErrorCode, TraceInfo};
pub use hook::TraceCallback;

use crate::mask::TraceMask;

/// What a connection reports to its trace callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    pub mask: TraceMask,
    /// Also hand the callback the statement text with bound parameters substituted.
    pub want_expanded_sql: bool,
}

impl TraceConfig {
    #[must_use]
    pub fn new(mask: TraceMask) -> Self {
        Self {
            mask,
            want_expanded_sql: false,
        }
    }

    #[must_use]
    pub fn with_expanded_sql(mut self, want_expanded_sql: bool) -> Self {
        self.want_expanded_sql = want_expanded_sql;
        self
    }
}
