use crate::transaction::TxnId;

/// Why the lock manager decided a transaction cannot proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Wait-die refused to let a younger transaction wait on an older holder.
    DeadlockPrevention,
    /// A lock was requested after the transaction had already released one.
    LockOnShrinking,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DbError {
    #[error("transaction {txn_id} must abort: {reason:?}")]
    TransactionAbort { txn_id: TxnId, reason: AbortReason },

    #[error("{0}")]
    Internal(String),
}

impl DbError {
    pub fn abort(txn_id: TxnId, reason: AbortReason) -> Self {
        DbError::TransactionAbort { txn_id, reason }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
