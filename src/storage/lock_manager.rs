use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::trace;

use crate::storage::StorageError;
use crate::types::AccountId;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type RowTable = DashMap<AccountId, Arc<Mutex<()>>>;

/// Process-wide table of per-account row locks.
///
/// Every acquisition sorts the requested ids and locks them in ascending
/// order. Two units of work that share an account therefore always contend
/// in the same order, which rules out a cycle of waiters.
///
/// A row's entry lives only while someone holds or waits on it, so ids that
/// never resolve to an account do not accumulate.
#[derive(Default)]
pub struct LockManager {
    rows: Arc<RowTable>
}

/// Exclusive hold on a set of account rows, released on drop.
pub struct AccountLocks {
    ids: Vec<AccountId>,
    guards: Vec<OwnedMutexGuard<()>>,
    rows: Arc<RowTable>
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every id in ascending order, waiting at most `wait` in total.
    ///
    /// On timeout the guards acquired so far are dropped with the pending
    /// future, so nothing stays held.
    pub async fn acquire(&self, ids: &[AccountId], wait: Option<Duration>) -> Result<AccountLocks, StorageError> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let rows: Vec<Arc<Mutex<()>>> = ordered.iter().map(|id| self.row(*id)).collect();

        let acquisition = async move {
            let mut guards = Vec::with_capacity(rows.len());

            for row in rows {
                guards.push(row.lock_owned().await);
            }

            guards
        };

        let guards = match wait {
            Some(limit) => match timeout(limit, acquisition).await {
                Ok(guards) => guards,
                Err(_) => {
                    prune(&self.rows, &ordered);
                    return Err(StorageError::LockTimeout { waited: limit })
                }
            },
            None => acquisition.await
        };

        trace!("Locked accounts {ordered:?}");

        Ok(AccountLocks { ids: ordered, guards, rows: Arc::clone(&self.rows) })
    }

    /// Number of rows currently held or waited on.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.rows.entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

impl AccountLocks {
    pub fn holds(&self, account_id: AccountId) -> bool {
        self.ids.binary_search(&account_id).is_ok()
    }

    /// Held ids, ascending.
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }
}

impl Drop for AccountLocks {
    fn drop(&mut self) {
        self.guards.clear();
        prune(&self.rows, &self.ids);
    }
}

// The shard lock taken by `remove_if` also guards `row`, so a count of one
// means no holder or waiter can appear for the entry while it is removed
fn prune(rows: &RowTable, ids: &[AccountId]) {
    for id in ids {
        rows.remove_if(id, |_, row| Arc::strong_count(row) == 1);
    }
}
