use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use tokio::task::spawn_blocking;
use tracing::trace;

use crate::models::{Account, NewTransferRecord, TransferRecord};
use crate::storage::ledger_store::LedgerStore;
use crate::storage::lock_manager::AccountLocks;
use crate::storage::{CommitBatch, StorageError};
use crate::types::AccountId;

/// A scoped set of reads and writes over exclusively locked accounts.
///
/// Writes are staged locally and become visible to other readers only when
/// `commit` succeeds, all at once. Dropping the unit (or calling `rollback`)
/// discards them and releases the locks.
pub struct UnitOfWork<'a> {
    store: &'a LedgerStore,
    locks: AccountLocks,
    accounts: HashMap<AccountId, Account>,
    transfers: Vec<TransferRecord>
}

/// What a successful commit published.
#[derive(Debug, Clone, Default)]
pub struct CommittedUnit {
    pub accounts: Vec<Account>,
    pub transfers: Vec<TransferRecord>
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(store: &'a LedgerStore, locks: AccountLocks) -> Self {
        Self {
            store,
            locks,
            accounts: HashMap::new(),
            transfers: Vec::new()
        }
    }

    /// Ids held by this unit, ascending.
    pub fn locked_ids(&self) -> &[AccountId] {
        self.locks.ids()
    }

    /// Looks up accounts, preferring writes staged in this unit.
    ///
    /// Ids that do not exist are absent from the result.
    pub fn find_accounts_by_ids(&self, ids: &[AccountId]) -> HashMap<AccountId, Account> {
        let tables = self.store.read();

        ids.iter()
            .filter_map(|id| {
                self.accounts.get(id)
                    .or_else(|| tables.account(*id))
                    .map(|account| (*id, account.clone()))
            })
            .collect()
    }

    /// Stages an upsert of `account`. The row must be locked by this unit.
    pub fn save_account(&mut self, account: Account) -> Result<(), StorageError> {
        self.ensure_locked(account.id)?;
        self.accounts.insert(account.id, account);

        Ok(())
    }

    /// Stages a new transfer record and assigns its id.
    ///
    /// Both referenced accounts must be locked by this unit.
    pub fn insert_transfer_record(&mut self, record: NewTransferRecord) -> Result<TransferRecord, StorageError> {
        self.ensure_locked(record.sender_account_id)?;
        self.ensure_locked(record.receiver_account_id)?;

        let record = TransferRecord {
            id: self.store.next_transfer_id(),
            sender_account_id: record.sender_account_id,
            receiver_account_id: record.receiver_account_id,
            amount: record.amount,
            commission_fee: record.commission_fee,
            created_at: Utc::now(),
            metadata: record.metadata
        };

        self.transfers.push(record.clone());

        Ok(record)
    }

    /// Durably records every staged write, then publishes them together.
    ///
    /// The journal append, the publish and the lock release run on one
    /// blocking task, so they complete even if the caller stops waiting.
    pub async fn commit(self) -> Result<CommittedUnit, StorageError> {
        let UnitOfWork { store, locks, accounts, mut transfers } = self;

        if accounts.is_empty() && transfers.is_empty() {
            return Ok(CommittedUnit::default())
        }

        let committed_at = Utc::now();

        for transfer in &mut transfers {
            transfer.created_at = committed_at;
        }

        let mut accounts: Vec<Account> = accounts.into_values().collect();
        accounts.sort_by_key(|account| account.id);

        let batch = CommitBatch { accounts, transfers };
        let log = Arc::clone(store.log());
        let tables = Arc::clone(store.tables());

        let batch = spawn_blocking(move || {
            log.append(&batch)?;
            tables.write().unwrap_or_else(PoisonError::into_inner).apply(&batch);
            drop(locks);

            Ok::<_, StorageError>(batch)
        })
        .await
        .map_err(|error| StorageError::Task(error.to_string()))??;

        trace!("Committed {} accounts and {} transfers", batch.accounts.len(), batch.transfers.len());

        Ok(CommittedUnit {
            accounts: batch.accounts,
            transfers: batch.transfers
        })
    }

    /// Discards staged writes and releases the locks.
    pub fn rollback(self) {
        trace!("Rolled back unit of work over accounts {:?}", self.locks.ids());
    }

    fn ensure_locked(&self, account_id: AccountId) -> Result<(), StorageError> {
        if self.locks.holds(account_id) {
            Ok(())
        } else {
            Err(StorageError::NotLocked { account_id })
        }
    }
}
