use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use rusqlite::DropBehavior;

use crate::tx_outcome::TxOutcome;

/// Commit/rollback half of a transaction handle.
///
/// Both methods consume the handle so a transaction is finished at most once.
pub trait TxControl {
    type Error;

    /// A failed commit must still leave the connection outside the
    /// transaction; callers do not follow it with [`TxControl::rollback`].
    ///
    /// # Errors
    /// Returns the backend error if the commit fails.
    fn commit(self) -> Result<(), Self::Error>;

    /// # Errors
    /// Returns the backend error if the rollback fails.
    fn rollback(self) -> Result<(), Self::Error>;
}

impl TxControl for rusqlite::Transaction<'_> {
    type Error = rusqlite::Error;

    fn commit(mut self) -> Result<(), Self::Error> {
        self.set_drop_behavior(DropBehavior::Ignore);
        let err = match self.execute_batch("COMMIT") {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        // SQLite keeps the transaction open after some failed commits
        // (deferred foreign keys, SQLITE_BUSY).
        if !self.is_autocommit() {
            tracing::debug!("commit failed; rolling back");
            if self.execute_batch("ROLLBACK").is_err() {
                tracing::warn!("rollback after failed commit also failed");
            }
        }
        Err(err)
    }

    fn rollback(self) -> Result<(), Self::Error> {
        rusqlite::Transaction::rollback(self)
    }
}

/// How [`run_in_transaction`] finishes a unit of work that returned normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TxPolicy {
    /// Roll back even when the work succeeded (exercises rollback paths in tests and demos).
    pub rollback_always: bool,
}

impl TxPolicy {
    #[must_use]
    pub fn commit() -> Self {
        Self {
            rollback_always: false,
        }
    }

    #[must_use]
    pub fn rollback_always() -> Self {
        Self {
            rollback_always: true,
        }
    }
}

/// Begin a transaction, run `work` in it, then commit or roll back.
///
/// - `begin` fails: its error is returned and `work` never runs.
/// - `work` returns `Err(e)`: the transaction is rolled back and `e` is
///   returned as is. A failing rollback is logged, not reported.
/// - `work` panics: the transaction is rolled back and the panic is resumed
///   with its original payload.
/// - `work` returns `Ok(v)`: with [`TxPolicy::rollback_always`] the
///   transaction is rolled back and `RolledBack(v)` returned; otherwise it is
///   committed and `Committed(v)` returned. A failed commit is returned as
///   is; leaving the transaction is up to [`TxControl::commit`].
///
/// Exactly one of commit or rollback is called once `begin` succeeded.
///
/// # Errors
/// Returns the error of `begin`, of `work`, of the commit, or of a requested
/// rollback.
pub fn run_in_transaction<Tx, B, F, T, E>(
    begin: B,
    policy: TxPolicy,
    work: F,
) -> Result<TxOutcome<T>, E>
where
    Tx: TxControl,
    B: FnOnce() -> Result<Tx, Tx::Error>,
    F: FnOnce(&Tx) -> Result<T, E>,
    E: From<Tx::Error>,
{
    let tx = begin()?;

    let value = match catch_unwind(AssertUnwindSafe(|| work(&tx))) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            tracing::debug!("unit of work failed; rolling back");
            if tx.rollback().is_err() {
                tracing::warn!("rollback after failed unit of work also failed");
            }
            return Err(err);
        }
        Err(panic) => {
            tracing::debug!("unit of work panicked; rolling back");
            if tx.rollback().is_err() {
                tracing::warn!("rollback after panic failed");
            }
            resume_unwind(panic);
        }
    };

    if policy.rollback_always {
        tracing::debug!("rollback_always set; rolling back");
        tx.rollback()?;
        Ok(TxOutcome::RolledBack(value))
    } else {
        tx.commit()?;
        tracing::debug!("transaction committed");
        Ok(TxOutcome::Committed(value))
    }
}
