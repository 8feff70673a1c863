/// Outcome of a transaction whose unit of work returned normally.
///
/// A unit of work that fails never produces a `TxOutcome`: its error is handed
/// back unchanged after rollback, and a panic keeps unwinding after rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum TxOutcome<T> {
    /// The work finished and the transaction committed.
    Committed(T),
    /// The work finished but [`TxPolicy::rollback_always`](crate::TxPolicy)
    /// discarded its changes.
    RolledBack(T),
}

impl<T> TxOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// Borrow the value returned by the unit of work.
    pub fn value(&self) -> &T {
        match self {
            Self::Committed(value) | Self::RolledBack(value) => value,
        }
    }

    /// Consume the outcome and take the value returned by the unit of work.
    pub fn into_value(self) -> T {
        match self {
            Self::Committed(value) | Self::RolledBack(value) => value,
        }
    }
}
