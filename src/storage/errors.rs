use std::time::Duration;

use thiserror::Error;

use crate::types::AccountId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Journal is corrupt at line {line}: {reason}")]
    CorruptJournal {
        line: usize,
        reason: String
    },
    #[error("Account [{account_id}] is not locked by this unit of work")]
    NotLocked {
        account_id: AccountId
    },
    #[error("Account [{account_id}] already exists")]
    AccountExists {
        account_id: AccountId
    },
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    #[error("Timed out after {waited:?} waiting for account locks")]
    LockTimeout {
        waited: Duration
    },
    #[error("Journal holds an unconfirmed append and must be reopened")]
    JournalUnusable,
    #[error("Storage task failed: {0}")]
    Task(String)
}
