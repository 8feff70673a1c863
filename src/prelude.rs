//! Convenient imports for common functionality.

pub use crate::connection::TracedConnection;
pub use crate::error::SqliteTraceError;
pub use crate::mask::{TraceMask, TraceMaskArgs, TraceMaskConfig};
pub use crate::trace::{TraceConfig, TraceInfo};
pub use crate::tx::{TxPolicy, run_in_transaction};
pub use crate::tx_outcome::TxOutcome;
