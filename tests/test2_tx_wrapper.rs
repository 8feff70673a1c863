use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use rusqlite::{Connection, ErrorCode, params};
use sqlite3_trace::prelude::*;

const INSERT: &str = "INSERT INTO t1 (seq_num, note) VALUES (?, ?)";
const SELECT: &str = "SELECT id, seq_num, note FROM t1 WHERE note LIKE ?";

fn setup(log: Option<Rc<RefCell<Vec<String>>>>) -> Result<TracedConnection, SqliteTraceError> {
    let config = TraceConfig::new(TraceMask::STMT);
    let conn = TracedConnection::open_in_memory(config, move |info| {
        if let Some(log) = &log {
            log.borrow_mut().push(info.stmt_or_trigger.to_string());
        }
    })?;
    conn.connection().execute_batch(
        "DROP TABLE IF EXISTS t1;
         CREATE TABLE t1 (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          seq_num INTEGER NOT NULL,
          note VARCHAR NOT NULL
         );",
    )?;
    Ok(conn)
}

fn insert_rows(conn: &Connection, n: i64, note: &str) -> Result<i64, SqliteTraceError> {
    let mut stmt = conn.prepare(INSERT)?;
    for seq in 0..n {
        stmt.execute(params![seq, note])?;
    }
    Ok(n)
}

fn count_rows(conn: &Connection, pattern: &str) -> Result<usize, SqliteTraceError> {
    let mut stmt = conn.prepare(SELECT)?;
    let mut rows = stmt.query([pattern])?;
    let mut n = 0;
    while rows.next()?.is_some() {
        n += 1;
    }
    Ok(n)
}

#[test]
fn committed_rows_are_visible_to_the_next_transaction() -> Result<(), SqliteTraceError> {
    let mut conn = setup(None)?;

    let outcome = conn.tx_wrap(TxPolicy::commit(), |tx| insert_rows(tx, 4, "bla-Tx-imm"))?;
    assert_eq!(outcome, TxOutcome::Committed(4));

    let seen = conn.tx_wrap(TxPolicy::commit(), |tx| count_rows(tx, "bla-Tx%"))?;
    assert!(seen.is_committed());
    assert_eq!(seen.into_value(), 4);
    Ok(())
}

#[test]
fn rollback_always_hides_successful_inserts() -> Result<(), SqliteTraceError> {
    let mut conn = setup(None)?;

    let outcome = conn.tx_wrap(TxPolicy::rollback_always(), |tx| insert_rows(tx, 4, "bla-Tx-imm"))?;
    assert_eq!(outcome, TxOutcome::RolledBack(4));
    assert_eq!(count_rows(conn.connection(), "%")?, 0);
    Ok(())
}

#[test]
fn failed_unit_of_work_rolls_back_with_its_own_error() -> Result<(), SqliteTraceError> {
    let mut conn = setup(None)?;

    let result: Result<TxOutcome<()>, SqliteTraceError> = conn.tx_wrap(TxPolicy::commit(), |tx| {
        insert_rows(tx, 2, "kept?")?;
        Err(SqliteTraceError::ExecutionError("stop here".into()))
    });
    match result {
        Err(SqliteTraceError::ExecutionError(msg)) => assert_eq!(msg, "stop here"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(count_rows(conn.connection(), "%")?, 0);
    Ok(())
}

#[test]
fn driver_error_is_propagated_unchanged() -> Result<(), SqliteTraceError> {
    let mut conn = setup(None)?;

    let result = conn.tx_wrap(TxPolicy::commit(), |tx| {
        tx.execute(
            "INSERT INTO t1 (id, seq_num, note) VALUES (1, 0, 'first')",
            [],
        )?;
        tx.execute(
            "INSERT INTO t1 (id, seq_num, note) VALUES (1, 1, 'dupe')",
            [],
        )?;
        Ok::<_, SqliteTraceError>(())
    });
    match result {
        Err(SqliteTraceError::SqliteError(rusqlite::Error::SqliteFailure(err, _))) => {
            assert_eq!(err.code, ErrorCode::ConstraintViolation);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(count_rows(conn.connection(), "%")?, 0);
    Ok(())
}

#[test]
fn panic_in_unit_of_work_rolls_back_and_unwinds() -> Result<(), SqliteTraceError> {
    let mut conn = setup(None)?;

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = conn.tx_wrap(TxPolicy::commit(), |tx| -> Result<(), SqliteTraceError> {
            insert_rows(tx, 3, "doomed").ok();
            panic!("unit of work gave up");
        });
    }));
    let payload = result.expect_err("panic must reach the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"unit of work gave up"));

    assert_eq!(count_rows(conn.connection(), "%")?, 0);
    // The connection is out of the transaction and usable again.
    let outcome = conn.tx_wrap(TxPolicy::commit(), |tx| insert_rows(tx, 1, "after"))?;
    assert_eq!(outcome, TxOutcome::Committed(1));
    Ok(())
}

#[test]
fn exactly_one_of_commit_or_rollback_reaches_sqlite() -> Result<(), SqliteTraceError> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut conn = setup(Some(Rc::clone(&log)))?;
    let finishes = |log: &RefCell<Vec<String>>| {
        let log = log.borrow();
        let commits = log.iter().filter(|s| s.as_str() == "COMMIT").count();
        let rollbacks = log.iter().filter(|s| s.as_str() == "ROLLBACK").count();
        (commits, rollbacks)
    };

    log.borrow_mut().clear();
    let outcome = conn.tx_wrap(TxPolicy::commit(), |tx| insert_rows(tx, 1, "a"))?;
    assert!(outcome.is_committed());
    assert!(log.borrow()[0].starts_with("BEGIN"));
    assert_eq!(finishes(&log), (1, 0));

    log.borrow_mut().clear();
    let outcome = conn.tx_wrap(TxPolicy::rollback_always(), |tx| insert_rows(tx, 1, "b"))?;
    assert!(!outcome.is_committed());
    assert_eq!(finishes(&log), (0, 1));

    log.borrow_mut().clear();
    let _ = conn.tx_wrap(TxPolicy::commit(), |_tx| -> Result<(), SqliteTraceError> {
        Err(SqliteTraceError::ExecutionError("no".into()))
    });
    assert_eq!(finishes(&log), (0, 1));
    Ok(())
}

#[test]
fn failed_commit_rolls_back_and_leaves_the_transaction() -> Result<(), SqliteTraceError> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut conn = setup(Some(Rc::clone(&log)))?;
    conn.connection().execute_batch(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE p (id INTEGER PRIMARY KEY);
         CREATE TABLE c (pid INTEGER REFERENCES p(id) DEFERRABLE INITIALLY DEFERRED);",
    )?;

    log.borrow_mut().clear();
    // The orphan row only violates the deferred key at COMMIT time.
    let result = conn.tx_wrap(TxPolicy::commit(), |tx| {
        tx.execute("INSERT INTO c VALUES (99)", [])?;
        Ok::<_, SqliteTraceError>(())
    });
    match result {
        Err(SqliteTraceError::SqliteError(rusqlite::Error::SqliteFailure(err, _))) => {
            assert_eq!(err.code, ErrorCode::ConstraintViolation);
            assert_eq!(err.extended_code, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let log = log.borrow();
    assert!(log[0].starts_with("BEGIN"), "{log:?}");
    assert_eq!(log[log.len() - 2..], ["COMMIT", "ROLLBACK"], "{log:?}");
    drop(log);

    assert!(conn.connection().is_autocommit());
    let orphans: i64 = conn
        .connection()
        .query_row("SELECT count(*) FROM c", [], |row| row.get(0))?;
    assert_eq!(orphans, 0);
    Ok(())
}
