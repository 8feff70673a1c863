use std::fmt;
use std::path::Path;

use rusqlite::{Connection, Transaction};

use crate::error::SqliteTraceError;
use crate::trace::hook::{self, TraceHook};
use crate::trace::{TraceConfig, TraceInfo};
use crate::tx::{TxPolicy, run_in_transaction};
use crate::tx_outcome::TxOutcome;

/// `rusqlite` connection with a trace callback attached.
pub struct TracedConnection {
    // Field order matters: the connection closes (firing CLOSE) before the
    // hook it points at is freed.
    conn: Connection,
    hook: Option<Box<TraceHook>>,
    config: Option<TraceConfig>,
}

impl TracedConnection {
    /// Open `path`, check it answers a query, and install `callback`.
    ///
    /// # Errors
    /// Returns `SqliteTraceError` if opening, the ping, or hook registration fails.
    pub fn open<P, F>(path: P, config: TraceConfig, callback: F) -> Result<Self, SqliteTraceError>
    where
        P: AsRef<Path>,
        F: FnMut(&TraceInfo<'_>) + 'static,
    {
        Self::with_connection(Connection::open(path)?, config, callback)
    }

    /// # Errors
    /// Returns `SqliteTraceError` if opening, the ping, or hook registration fails.
    pub fn open_in_memory<F>(config: TraceConfig, callback: F) -> Result<Self, SqliteTraceError>
    where
        F: FnMut(&TraceInfo<'_>) + 'static,
    {
        Self::with_connection(Connection::open_in_memory()?, config, callback)
    }

    /// Take ownership of an already opened connection and trace it.
    ///
    /// # Errors
    /// Returns `SqliteTraceError` if the ping or hook registration fails.
    pub fn with_connection<F>(
        conn: Connection,
        config: TraceConfig,
        callback: F,
    ) -> Result<Self, SqliteTraceError>
    where
        F: FnMut(&TraceInfo<'_>) + 'static,
    {
        let mut traced = Self {
            conn,
            hook: None,
            config: None,
        };
        traced.ping()?;
        traced.set_trace(config, callback)?;
        Ok(traced)
    }

    /// Replace the trace callback and mask.
    ///
    /// # Errors
    /// Returns `SqliteTraceError::TraceHookError` if SQLite rejects the registration.
    pub fn set_trace<F>(&mut self, config: TraceConfig, callback: F) -> Result<(), SqliteTraceError>
    where
        F: FnMut(&TraceInfo<'_>) + 'static,
    {
        let mut new_hook = TraceHook::new(Box::new(callback), config.want_expanded_sql);
        hook::register(&self.conn, config.mask, &mut new_hook)?;
        // SQLite points at the new hook now; the old one can go.
        self.hook = Some(new_hook);
        self.config = Some(config);
        Ok(())
    }

    pub fn remove_trace(&mut self) {
        hook::unregister(&self.conn);
        self.hook = None;
        self.config = None;
    }

    #[must_use]
    pub fn trace_config(&self) -> Option<TraceConfig> {
        self.config
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// # Errors
    /// Returns `SqliteTraceError` if the connection cannot run `SELECT 1`.
    pub fn ping(&self) -> Result<(), SqliteTraceError> {
        let one: i64 = self.conn.query_row("SELECT 1", [], |row| row.get(0))?;
        if one == 1 {
            Ok(())
        } else {
            Err(SqliteTraceError::ExecutionError(format!(
                "ping returned {one}"
            )))
        }
    }

    /// Run `work` inside a transaction on this connection.
    ///
    /// See [`run_in_transaction`] for the commit/rollback rules.
    ///
    /// # Errors
    /// Returns the error of beginning, of `work`, of the commit, or of a
    /// requested rollback.
    pub fn tx_wrap<F, T, E>(&mut self, policy: TxPolicy, work: F) -> Result<TxOutcome<T>, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let begun = self.conn.transaction();
        run_in_transaction(move || begun, policy, work)
    }

    /// Close the connection, reporting close errors instead of ignoring them.
    ///
    /// # Errors
    /// Returns `SqliteTraceError::SqliteError` if `sqlite3_close` fails.
    pub fn close(self) -> Result<(), SqliteTraceError> {
        let Self { conn, hook, .. } = self;
        let result = conn.close().map_err(|(_conn, err)| SqliteTraceError::from(err));
        drop(hook);
        result
    }
}

impl fmt::Debug for TracedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedConnection")
            .field("conn", &self.conn)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
