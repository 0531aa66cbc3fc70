mod errors;
mod journal;
mod ledger_store;
mod lock_manager;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;
mod unit_of_work;

use serde::{Deserialize, Serialize};

use crate::models::{Account, TransferRecord};

pub use errors::StorageError;
pub use journal::{FileJournal, MemoryLog};
pub use ledger_store::{LedgerStore, PageRequest, Pagination, TransferPage, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use lock_manager::{AccountLocks, LockManager, DEFAULT_LOCK_TIMEOUT};
pub use unit_of_work::{CommittedUnit, UnitOfWork};

/// Everything one unit of work wrote, persisted as a single journal entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitBatch {
    pub accounts: Vec<Account>,
    pub transfers: Vec<TransferRecord>
}

/// Durable sink for committed batches.
///
/// `append` must not return until the batch survives a crash. It is called
/// from a blocking task, never from the async executor.
pub trait CommitLog: Send + Sync + 'static {
    fn append(&self, batch: &CommitBatch) -> Result<(), StorageError>;
}
