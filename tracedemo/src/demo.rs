use rusqlite::{Connection, Rows, params};
use sqlite3_trace::prelude::*;

use crate::args::DemoConfig;

// Note: "INTEGER PRIMARY KEY NOT NULL AUTOINCREMENT" is a syntax error in
// SQLite; AUTOINCREMENT must directly follow PRIMARY KEY.
const TABLE_DDL: &str = "CREATE TABLE t1 (
 id INTEGER PRIMARY KEY AUTOINCREMENT,
 seq_num INTEGER NOT NULL,
 note VARCHAR NOT NULL
)";

const INSERT_DML: &str = "INSERT INTO t1 (seq_num, note) VALUES (?, ?)";
const SELECT_DML: &str = "SELECT id, seq_num, note FROM t1 WHERE note LIKE ?";

const NOTE_TEXT_PREFIX: &str = "bla-1234567890";

/// Print one trace event per line on stdout.
pub(crate) fn print_trace(info: &TraceInfo<'_>) {
    println!("{info}");
}

/// Open `config.db` with tracing on and run the whole walkthrough.
///
/// # Errors
/// Returns the first database or transaction error; the connection is
/// closed before the error reaches the caller.
pub(crate) fn run(config: &DemoConfig) -> Result<(), SqliteTraceError> {
    let trace = TraceConfig::new(config.trace.event_mask()).with_expanded_sql(true);
    let mut conn = TracedConnection::open(&config.db, trace, print_trace)?;
    let mut demo = Demo::new(config);
    demo.run(&mut conn)?;
    conn.close()
}

pub(crate) struct Demo {
    nrows: u32,
    search_pattern: String,
    policy: TxPolicy,
    row_seq_num: i64,
}

impl Demo {
    pub(crate) fn new(config: &DemoConfig) -> Self {
        Self {
            nrows: config.nrows,
            search_pattern: config.search_pattern.clone(),
            policy: config.policy,
            row_seq_num: 0,
        }
    }

    pub(crate) fn run(&mut self, conn: &mut TracedConnection) -> Result<(), SqliteTraceError> {
        let policy = self.policy;

        setup(conn.connection())?;

        self.insert(conn.connection(), "DB-imm")?;
        let outcome = conn.tx_wrap(policy, |tx| self.insert(tx, "Tx-imm"))?;
        log_outcome("Tx-imm", &outcome);

        self.insert_prepared(conn.connection(), "DB-Prepare")?;
        let outcome = conn.tx_wrap(policy, |tx| self.insert_prepared(tx, "Tx-Prepare"))?;
        log_outcome("Tx-Prepare", &outcome);

        self.select(conn.connection(), "DB-imm")?;
        let outcome = conn.tx_wrap(policy, |tx| self.select(tx, "Tx-imm"))?;
        log_outcome("Tx-imm", &outcome);

        self.select_prepared(conn.connection(), "DB-Prepare")?;
        let outcome = conn.tx_wrap(policy, |tx| self.select_prepared(tx, "Tx-Prepare"))?;
        log_outcome("Tx-Prepare", &outcome);

        Ok(())
    }

    /// One-shot `execute` per row.
    fn insert(&mut self, conn: &Connection, descr: &str) -> Result<usize, SqliteTraceError> {
        let note = format!("{NOTE_TEXT_PREFIX}{descr}");
        for i in 0..self.nrows {
            let affected = conn.execute(INSERT_DML, params![self.row_seq_num, note])?;
            log_exec_result(conn, descr, i, affected);
            self.row_seq_num += 1;
        }
        Ok(self.nrows as usize)
    }

    /// One statement prepared up front, executed per row.
    fn insert_prepared(&mut self, conn: &Connection, descr: &str) -> Result<usize, SqliteTraceError> {
        let note = format!("{NOTE_TEXT_PREFIX}{descr}");
        let mut stmt = conn.prepare(INSERT_DML)?;
        for i in 0..self.nrows {
            let affected = stmt.execute(params![self.row_seq_num, note])?;
            log_exec_result(conn, descr, i, affected);
            self.row_seq_num += 1;
        }
        Ok(self.nrows as usize)
    }

    /// Query through the connection's statement cache.
    fn select(&self, conn: &Connection, descr: &str) -> Result<usize, SqliteTraceError> {
        let mut stmt = conn.prepare_cached(SELECT_DML)?;
        let rows = stmt.query([&self.search_pattern])?;
        fetch_rows(rows, descr)
    }

    /// Query through a statement prepared and owned by the caller.
    fn select_prepared(&self, conn: &Connection, descr: &str) -> Result<usize, SqliteTraceError> {
        let mut stmt = conn.prepare(SELECT_DML)?;
        let rows = stmt.query([&self.search_pattern])?;
        fetch_rows(rows, descr)
    }
}

fn setup(conn: &Connection) -> Result<(), SqliteTraceError> {
    conn.execute("DROP TABLE IF EXISTS t1", [])?;
    conn.execute(TABLE_DDL, [])?;
    Ok(())
}

fn log_exec_result(conn: &Connection, descr: &str, call_index: u32, affected: usize) {
    tracing::info!(
        "Exec result for {} ({}): ID = {}, affected = {}",
        descr,
        call_index,
        conn.last_insert_rowid(),
        affected
    );
}

fn fetch_rows(mut rows: Rows<'_>, descr: &str) -> Result<usize, SqliteTraceError> {
    let mut fetched = 0;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let seq_num: i64 = row.get(1)?;
        let note: String = row.get(2)?;
        tracing::debug!(id, seq_num, note = %note, "row");
        fetched += 1;
    }
    tracing::info!("Fetched {} rows for {}", fetched, descr);
    Ok(fetched)
}

fn log_outcome(descr: &str, outcome: &TxOutcome<usize>) {
    match outcome {
        TxOutcome::Committed(n) => tracing::info!("{}: transaction committed ({} rows)", descr, n),
        TxOutcome::RolledBack(n) => {
            tracing::info!("{}: transaction rolled back ({} rows)", descr, n);
        }
    }
}
