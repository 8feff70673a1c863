//! Helpers for watching what SQLite does on a `rusqlite` connection.
//!
//! - [`TraceMaskConfig`] turns command-line flags into a `sqlite3_trace_v2` event mask.
//! - [`TracedConnection`] installs a Rust closure as the connection's trace callback;
//!   each event arrives as a [`TraceInfo`] whose `Display` impl renders one line.
//! - [`run_in_transaction`] / [`TracedConnection::tx_wrap`] run a unit of work and
//!   commit, or roll back on error, panic, or [`TxPolicy::rollback_always`].

pub mod connection;
pub mod error;
pub mod mask;
pub mod prelude;
pub mod trace;
pub mod tx;
pub mod tx_outcome;

pub use connection::TracedConnection;
pub use error::SqliteTraceError;
pub use mask::{TraceMask, TraceMaskArgs, TraceMaskConfig};
pub use trace::{DbErrorCode, TraceCallback, TraceConfig, TraceInfo};
pub use tx::{TxControl, TxPolicy, run_in_transaction};
pub use tx_outcome::TxOutcome;
