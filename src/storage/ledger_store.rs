use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Account, TransferRecord};
use crate::storage::lock_manager::LockManager;
use crate::storage::unit_of_work::UnitOfWork;
use crate::storage::{CommitBatch, CommitLog, FileJournal, MemoryLog, StorageError, DEFAULT_LOCK_TIMEOUT};
use crate::types::{AccountId, Money, TransferId};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// Committed state. Only ever mutated by publishing a whole `CommitBatch`.
#[derive(Default)]
pub(crate) struct Tables {
    accounts: HashMap<AccountId, Account>,
    transfers: BTreeMap<TransferId, TransferRecord>,
    by_account: HashMap<AccountId, Vec<TransferId>>
}

impl Tables {
    pub(crate) fn apply(&mut self, batch: &CommitBatch) {
        for account in &batch.accounts {
            self.accounts.insert(account.id, account.clone());
        }

        for transfer in &batch.transfers {
            if self.transfers.insert(transfer.id, transfer.clone()).is_some() {
                continue;
            }

            self.by_account.entry(transfer.sender_account_id).or_default().push(transfer.id);

            if transfer.receiver_account_id != transfer.sender_account_id {
                self.by_account.entry(transfer.receiver_account_id).or_default().push(transfer.id);
            }
        }
    }

    pub(crate) fn account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.get(&account_id)
    }
}

/// Account balances and transfer records behind row-level locking.
///
/// A store is a long-lived handle: it owns the lock table, so every engine
/// that mutates the same accounts must share one instance (typically through
/// an `Arc`).
pub struct LedgerStore {
    tables: Arc<RwLock<Tables>>,
    locks: LockManager,
    log: Arc<dyn CommitLog>,
    next_transfer_id: AtomicU64,
    lock_timeout: Option<Duration>
}

impl LedgerStore {
    /// A store whose commits are not persisted anywhere.
    pub fn in_memory() -> Self {
        Self::with_log(Arc::new(MemoryLog::new()))
    }

    pub fn with_log(log: Arc<dyn CommitLog>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            locks: LockManager::new(),
            log,
            next_transfer_id: AtomicU64::new(1),
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT)
        }
    }

    /// Bounds the lock wait of the store's own writes, such as `open_account`.
    /// `None` waits indefinitely.
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Opens (or creates) a journal-backed store and replays its history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let (journal, batches) = FileJournal::open(path)?;
        let store = Self::with_log(Arc::new(journal));

        {
            let mut tables = store.tables.write().unwrap_or_else(PoisonError::into_inner);

            for batch in &batches {
                tables.apply(batch);
            }

            let last_id = tables.transfers.keys().next_back().copied().unwrap_or(0);
            store.next_transfer_id.store(last_id + 1, Ordering::Release);

            info!("Ledger store recovered {} accounts and {} transfers", tables.accounts.len(), tables.transfers.len());
        }

        Ok(store)
    }

    /// Opens a unit of work holding exclusive locks on `ids`.
    ///
    /// Locks are always taken in ascending id order regardless of the order
    /// given. `wait` bounds the total time spent acquiring them.
    pub async fn begin(&self, ids: &[AccountId], wait: Option<Duration>) -> Result<UnitOfWork<'_>, StorageError> {
        let locks = self.locks.acquire(ids, wait).await?;

        Ok(UnitOfWork::new(self, locks))
    }

    /// Creates an account with an opening balance.
    pub async fn open_account(&self, account_id: AccountId, opening_balance: Money) -> Result<Account, StorageError> {
        if account_id == 0 {
            return Err(StorageError::InvalidAccount("account id must be positive".to_string()))
        }

        if opening_balance.is_negative() {
            return Err(StorageError::InvalidAccount(format!("opening balance [{opening_balance}] is negative")))
        }

        let mut unit = self.begin(&[account_id], self.lock_timeout).await?;

        if unit.find_accounts_by_ids(&[account_id]).contains_key(&account_id) {
            return Err(StorageError::AccountExists { account_id })
        }

        let account = Account::new(account_id, opening_balance);
        unit.save_account(account.clone())?;
        unit.commit().await?;

        debug!("Opened account [{account_id}] with balance [{opening_balance}]");

        Ok(account)
    }

    pub fn account(&self, account_id: AccountId) -> Option<Account> {
        self.read().account(account_id).cloned()
    }

    pub fn balance(&self, account_id: AccountId) -> Option<Money> {
        self.read().account(account_id).map(|account| account.balance)
    }

    /// Snapshot of all accounts, ordered by id.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.read().accounts.values().cloned().collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    pub fn transfer(&self, transfer_id: TransferId) -> Option<TransferRecord> {
        self.read().transfers.get(&transfer_id).cloned()
    }

    pub fn transfer_count(&self) -> usize {
        self.read().transfers.len()
    }

    /// Snapshot of all transfers, ordered by id.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.read().transfers.values().cloned().collect()
    }

    /// One page of the transfers an account sent or received, newest first.
    ///
    /// The balance comes from the stored account row. Returns `None` if the
    /// account does not exist.
    pub fn list_transfers(&self, account_id: AccountId, request: PageRequest) -> Option<TransferPage> {
        let tables = self.read();
        let balance = tables.account(account_id)?.balance;

        let mut matching: Vec<&TransferRecord> = tables.by_account.get(&account_id)
            .into_iter()
            .flatten()
            .filter_map(|transfer_id| tables.transfers.get(transfer_id))
            .collect();

        matching.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then(right.id.cmp(&left.id))
        });

        let total = matching.len();
        let pagination = Pagination::new(total, request);

        // Pages past the end are empty, however far past
        let offset = (pagination.current_page - 1)
            .checked_mul(pagination.per_page)
            .unwrap_or(usize::MAX);

        let transfers = matching.into_iter()
            .skip(offset)
            .take(pagination.per_page)
            .cloned()
            .collect();

        Some(TransferPage { balance, transfers, pagination })
    }

    pub(crate) fn tables(&self) -> &Arc<RwLock<Tables>> {
        &self.tables
    }

    pub(crate) fn log(&self) -> &Arc<dyn CommitLog> {
        &self.log
    }

    pub(crate) fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn next_transfer_id(&self) -> TransferId {
        self.next_transfer_id.fetch_add(1, Ordering::AcqRel)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 1-based page selection for history reads.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize
}

impl PageRequest {
    /// Clamps `per_page` to `1..=MAX_PER_PAGE` and `page` to at least 1.
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE)
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub per_page: usize,
    pub current_page: usize,
    pub last_page: usize
}

impl Pagination {
    fn new(total: usize, request: PageRequest) -> Self {
        let request = PageRequest::new(request.page, request.per_page);

        Self {
            total,
            per_page: request.per_page,
            current_page: request.page,
            last_page: total.div_ceil(request.per_page).max(1)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferPage {
    pub balance: Money,
    pub transfers: Vec<TransferRecord>,
    pub pagination: Pagination
}
