use super::testing::FlakyLog;
use super::{CommitBatch, CommitLog, FileJournal, LedgerStore, MemoryLog, PageRequest, StorageError};
use crate::models::{Account, NewTransferRecord};
use crate::types::{AccountId, Money};

use std::fs;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::tempdir;

fn money(value: &str) -> Result<Money> {
    Ok(Money::from_str(value)?)
}

async fn record_transfer(store: &LedgerStore, sender: AccountId, receiver: AccountId, amount: &str) -> Result<()> {
    let mut unit = store.begin(&[sender, receiver], None).await?;
    unit.insert_transfer_record(NewTransferRecord {
        sender_account_id: sender,
        receiver_account_id: receiver,
        amount: money(amount)?,
        commission_fee: Money::new(),
        metadata: None
    })?;
    unit.commit().await?;

    Ok(())
}

#[tokio::test]
async fn test_store_opens_and_reads_accounts() -> Result<()> {
    let store = LedgerStore::in_memory();

    assert!(store.account(1).is_none());

    store.open_account(1, money("100.00")?).await?;

    let account = store.account(1).ok_or_else(|| anyhow!("Account 1 missing from store"))?;

    assert_eq!(account, Account::new(1, money("100.00")?));
    assert_eq!(store.balance(1), Some(money("100")?));

    Ok(())
}

#[tokio::test]
async fn test_store_rejects_invalid_or_duplicate_accounts() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("10.00")?).await?;

    assert!(matches!(store.open_account(1, money("5.00")?).await, Err(StorageError::AccountExists { account_id: 1 })));
    assert!(matches!(store.open_account(0, money("5.00")?).await, Err(StorageError::InvalidAccount(_))));
    assert!(matches!(store.open_account(2, money("-5.00")?).await, Err(StorageError::InvalidAccount(_))));
    assert_eq!(store.balance(1), Some(money("10.00")?));

    Ok(())
}

#[tokio::test]
async fn test_staged_writes_are_invisible_until_commit() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("10.00")?).await?;

    let mut unit = store.begin(&[1], None).await?;
    unit.save_account(Account::new(1, money("99.00")?))?;

    assert_eq!(unit.find_accounts_by_ids(&[1])[&1].balance, money("99.00")?);
    assert_eq!(store.balance(1), Some(money("10.00")?));

    let committed = unit.commit().await?;

    assert_eq!(committed.accounts.len(), 1);
    assert_eq!(store.balance(1), Some(money("99.00")?));

    Ok(())
}

#[tokio::test]
async fn test_dropped_unit_discards_writes_and_releases_locks() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("10.00")?).await?;

    {
        let mut unit = store.begin(&[1], None).await?;
        unit.save_account(Account::new(1, money("0.00")?))?;
    }

    let unit = store.begin(&[1], Some(Duration::from_millis(100))).await?;
    unit.rollback();

    assert_eq!(store.balance(1), Some(money("10.00")?));

    Ok(())
}

#[tokio::test]
async fn test_only_non_empty_units_reach_the_log() -> Result<()> {
    let log = Arc::new(MemoryLog::new());
    let store = LedgerStore::with_log(log.clone());
    store.open_account(1, money("1.00")?).await?;

    let unit = store.begin(&[1], None).await?;
    assert!(unit.commit().await?.accounts.is_empty());

    assert_eq!(log.commits(), 1);

    Ok(())
}

#[tokio::test]
async fn test_find_accounts_omits_missing_ids() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("1.00")?).await?;

    let unit = store.begin(&[1, 2], None).await?;
    let found = unit.find_accounts_by_ids(&[1, 2]);

    assert_eq!(found.len(), 1);
    assert!(found.contains_key(&1));

    Ok(())
}

#[tokio::test]
async fn test_writes_outside_the_locked_set_are_rejected() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("1.00")?).await?;
    store.open_account(2, money("1.00")?).await?;

    let mut unit = store.begin(&[1], None).await?;

    assert!(matches!(unit.save_account(Account::new(2, money("5.00")?)), Err(StorageError::NotLocked { account_id: 2 })));

    let record = NewTransferRecord {
        sender_account_id: 1,
        receiver_account_id: 2,
        amount: money("1.00")?,
        commission_fee: Money::new(),
        metadata: None
    };

    assert!(matches!(unit.insert_transfer_record(record), Err(StorageError::NotLocked { account_id: 2 })));

    Ok(())
}

#[tokio::test]
async fn test_locks_are_taken_in_ascending_order_without_duplicates() -> Result<()> {
    let store = LedgerStore::in_memory();
    let unit = store.begin(&[9, 3, 7, 3], None).await?;

    assert_eq!(unit.locked_ids(), &[3, 7, 9]);

    Ok(())
}

#[tokio::test]
async fn test_lock_wait_times_out_and_releases_partial_locks() -> Result<()> {
    let store = LedgerStore::in_memory();
    let held = store.begin(&[2], None).await?;

    // 1 is acquired first, then the wait on 2 times out
    let result = store.begin(&[2, 1], Some(Duration::from_millis(50))).await;

    assert!(matches!(result, Err(StorageError::LockTimeout { .. })));

    let unit = store.begin(&[1], Some(Duration::from_millis(50))).await?;
    assert_eq!(unit.locked_ids(), &[1]);

    drop(held);

    Ok(())
}

#[tokio::test]
async fn test_lock_rows_are_dropped_once_nobody_holds_them() -> Result<()> {
    let store = LedgerStore::in_memory();
    let held = store.begin(&[2], None).await?;

    let result = store.begin(&[1, 2], Some(Duration::from_millis(50))).await;
    assert!(matches!(result, Err(StorageError::LockTimeout { .. })));

    // Row 2 is still held, row 1 was only touched by the timed out wait
    assert_eq!(store.lock_manager().len(), 1);

    drop(held);
    assert!(store.lock_manager().is_empty());

    let unit = store.begin(&[3, 4], None).await?;
    assert_eq!(store.lock_manager().len(), 2);
    unit.rollback();
    assert!(store.lock_manager().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_open_account_respects_the_store_lock_timeout() -> Result<()> {
    let store = LedgerStore::in_memory().with_lock_timeout(Some(Duration::from_millis(50)));
    let held = store.begin(&[1], None).await?;

    assert!(matches!(store.open_account(1, money("5.00")?).await, Err(StorageError::LockTimeout { .. })));

    drop(held);
    store.open_account(1, money("5.00")?).await?;

    assert_eq!(store.balance(1), Some(money("5.00")?));

    Ok(())
}

#[tokio::test]
async fn test_transfer_ids_are_assigned_monotonically() -> Result<()> {
    let store = LedgerStore::in_memory();

    for _ in 0..3 {
        record_transfer(&store, 1, 2, "1.00").await?;
    }

    let ids: Vec<u64> = store.transfers().iter().map(|record| record.id).collect();

    assert_eq!(ids, vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn test_failed_commit_leaves_no_trace() -> Result<()> {
    let store = LedgerStore::with_log(Arc::new(FlakyLog::failing_after(1)));
    store.open_account(1, money("50.00")?).await?;

    let mut unit = store.begin(&[1], None).await?;
    unit.save_account(Account::new(1, money("0.00")?))?;

    assert!(matches!(unit.commit().await, Err(StorageError::Io(_))));
    assert_eq!(store.balance(1), Some(money("50.00")?));

    // The locks were released with the failed commit
    let unit = store.begin(&[1], Some(Duration::from_millis(50))).await?;
    unit.rollback();

    Ok(())
}

#[tokio::test]
async fn test_journal_replays_committed_state() -> Result<()> {
    let directory = tempdir()?;
    let path = directory.path().join("ledger").join("journal.log");

    {
        let store = LedgerStore::open(&path)?;
        store.open_account(1, money("100.00")?).await?;
        store.open_account(2, money("0.00")?).await?;

        let mut unit = store.begin(&[1, 2], None).await?;
        unit.save_account(Account::new(1, money("89.85")?))?;
        unit.save_account(Account::new(2, money("10.00")?))?;
        unit.insert_transfer_record(NewTransferRecord {
            sender_account_id: 1,
            receiver_account_id: 2,
            amount: money("10.00")?,
            commission_fee: money("0.15")?,
            metadata: Some(serde_json::json!({ "note": "rent" }))
        })?;
        unit.commit().await?;
    }

    let store = LedgerStore::open(&path)?;

    assert_eq!(store.balance(1), Some(money("89.85")?));
    assert_eq!(store.balance(2), Some(money("10.00")?));
    assert_eq!(store.transfer_count(), 1);

    let record = store.transfer(1).ok_or_else(|| anyhow!("Transfer 1 missing after replay"))?;
    assert_eq!(record.commission_fee, money("0.15")?);
    assert_eq!(record.metadata, Some(serde_json::json!({ "note": "rent" })));

    let history = store.list_transfers(2, PageRequest::default()).ok_or_else(|| anyhow!("Account 2 missing after replay"))?;
    assert_eq!(history.pagination.total, 1);

    record_transfer(&store, 1, 2, "1.00").await?;
    assert!(store.transfer(2).is_some());

    Ok(())
}

#[tokio::test]
async fn test_journal_discards_torn_tail() -> Result<()> {
    let directory = tempdir()?;
    let path = directory.path().join("journal.log");

    {
        let store = LedgerStore::open(&path)?;
        store.open_account(1, money("5.00")?).await?;
    }

    let mut file = fs::OpenOptions::new().append(true).open(&path)?;
    write!(file, "{{\"accounts\":[{{\"id\":1,\"bal")?;
    drop(file);

    let store = LedgerStore::open(&path)?;
    assert_eq!(store.balance(1), Some(money("5.00")?));

    store.open_account(2, money("7.00")?).await?;
    drop(store);

    let store = LedgerStore::open(&path)?;
    assert_eq!(store.balance(2), Some(money("7.00")?));

    Ok(())
}

#[tokio::test]
async fn test_journal_rejects_corruption_before_the_tail() -> Result<()> {
    let directory = tempdir()?;
    let path = directory.path().join("journal.log");

    fs::write(&path, "not json\n{\"accounts\":[],\"transfers\":[]}\n")?;

    assert!(matches!(LedgerStore::open(&path), Err(StorageError::CorruptJournal { line: 1, .. })));

    Ok(())
}

#[test]
fn test_journal_refuses_appends_once_marked_unusable() -> Result<()> {
    let directory = tempdir()?;
    let path = directory.path().join("journal.log");

    let (journal, _) = FileJournal::open(&path)?;
    journal.append(&CommitBatch::default())?;

    journal.mark_unusable();

    assert!(journal.is_unusable());
    assert!(matches!(journal.append(&CommitBatch::default()), Err(StorageError::JournalUnusable)));
    drop(journal);

    let (journal, batches) = FileJournal::open(&path)?;

    assert_eq!(batches.len(), 1);
    assert!(!journal.is_unusable());

    Ok(())
}

#[tokio::test]
async fn test_history_is_paginated_newest_first() -> Result<()> {
    let store = LedgerStore::in_memory();
    store.open_account(1, money("0.00")?).await?;

    for index in 0..5 {
        let (sender, receiver) = if index % 2 == 0 { (1, 2) } else { (2, 1) };
        record_transfer(&store, sender, receiver, "1.00").await?;
    }

    record_transfer(&store, 3, 4, "1.00").await?;

    let page = store.list_transfers(1, PageRequest::new(1, 2)).ok_or_else(|| anyhow!("Account 1 missing"))?;

    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.pagination.last_page, 3);
    assert_eq!(page.transfers.iter().map(|record| record.id).collect::<Vec<_>>(), vec![5, 4]);
    assert_eq!(page.balance, money("0.00")?);

    let last = store.list_transfers(1, PageRequest::new(3, 2)).ok_or_else(|| anyhow!("Account 1 missing"))?;
    assert_eq!(last.transfers.iter().map(|record| record.id).collect::<Vec<_>>(), vec![1]);

    assert!(store.list_transfers(42, PageRequest::default()).is_none());

    let beyond = store.list_transfers(1, PageRequest::new(usize::MAX, 20)).ok_or_else(|| anyhow!("Account 1 missing"))?;
    assert!(beyond.transfers.is_empty());
    assert_eq!(beyond.pagination.total, 5);
    assert_eq!(beyond.pagination.current_page, usize::MAX);

    Ok(())
}

#[test]
fn test_page_request_is_clamped() {
    assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, per_page: 1 });
    assert_eq!(PageRequest::new(2, 500), PageRequest { page: 2, per_page: 100 });
    assert_eq!(PageRequest::default(), PageRequest { page: 1, per_page: 20 });
}
