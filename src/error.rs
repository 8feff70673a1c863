use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteTraceError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Trace hook error: sqlite3_trace_v2 returned {0}")]
    TraceHookError(i32),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}
