use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::engine::EngineConfig;
use crate::models::{NewTransferRecord, TransferError, TransferReceipt};
use crate::storage::{LedgerStore, StorageError};
use crate::types::{AccountId, Money};

/// Moves funds between two accounts, less commission, as one unit of work.
///
/// Engines are cheap: any number of them may share a single `LedgerStore`,
/// and the store's lock table keeps their transfers serializable.
pub struct TransferEngine {
    store: Arc<LedgerStore>,
    config: EngineConfig
}

impl TransferEngine {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub async fn execute(&self, sender_id: AccountId, receiver_id: AccountId, amount: &str) -> Result<TransferReceipt, TransferError> {
        self.execute_with_metadata(sender_id, receiver_id, amount, None).await
    }

    /// Executes a transfer, attaching `metadata` to the resulting record.
    ///
    /// # Errors
    /// - `SelfTransfer` if both ids are equal.
    /// - `InvalidAmount` if `amount` is not a positive value with at most two decimals.
    /// - `LockTimeout` if the account locks could not be acquired in time.
    /// - `AccountNotFound` if either account does not exist.
    /// - `InsufficientFunds` if the sender cannot cover amount plus commission.
    /// - `StorageFailure` if the commit could not be made durable.
    ///
    /// On every error, no balance and no record has changed.
    pub async fn execute_with_metadata(&self, sender_id: AccountId, receiver_id: AccountId, amount: &str, metadata: Option<Value>) -> Result<TransferReceipt, TransferError> {
        let result = self.transfer(sender_id, receiver_id, amount, metadata).await;

        match &result {
            Ok(receipt) => {
                debug!(
                    "Transfer [{}] of [{}] (commission [{}]) from [{}] to [{}] committed",
                    receipt.record.id, receipt.record.amount, receipt.record.commission_fee, sender_id, receiver_id
                );
            }
            Err(error @ TransferError::LockTimeout { .. }) => {
                warn!("Transfer from [{sender_id}] to [{receiver_id}] failed: {error}");
            }
            Err(error @ TransferError::StorageFailure(_)) => {
                error!("Transfer from [{sender_id}] to [{receiver_id}] failed: {error}");
            }
            Err(error) => {
                debug!("Transfer from [{sender_id}] to [{receiver_id}] rejected: {error}");
            }
        }

        result
    }

    /// Commission owed on `amount` under this engine's rate.
    pub fn commission_for(&self, amount: Money) -> Result<Money, TransferError> {
        amount.commission(self.config.commission_rate)
            .map_err(|error| TransferError::invalid_amount(&amount.to_string(), error))
    }

    async fn transfer(&self, sender_id: AccountId, receiver_id: AccountId, raw_amount: &str, metadata: Option<Value>) -> Result<TransferReceipt, TransferError> {
        if sender_id == receiver_id {
            return Err(TransferError::self_transfer(sender_id))
        }

        let amount = parse_amount(raw_amount)?;
        let commission = self.commission_for(amount)?;
        let total_debit = amount.checked_add(commission)
            .ok_or_else(|| TransferError::overflow(amount))?;

        // Both rows stay locked until the unit commits or is dropped
        let mut unit = self.store.begin(&[sender_id, receiver_id], self.config.lock_timeout).await?;

        let mut accounts = unit.find_accounts_by_ids(&[sender_id, receiver_id]);

        let mut sender = accounts.remove(&sender_id)
            .ok_or_else(|| TransferError::account_not_found(sender_id))?;
        let mut receiver = accounts.remove(&receiver_id)
            .ok_or_else(|| TransferError::account_not_found(receiver_id))?;

        sender.debit(total_debit)?;
        receiver.credit(amount)?;

        let sender_balance = sender.balance;
        let receiver_balance = receiver.balance;

        unit.save_account(sender)?;
        unit.save_account(receiver)?;
        unit.insert_transfer_record(NewTransferRecord {
            sender_account_id: sender_id,
            receiver_account_id: receiver_id,
            amount,
            commission_fee: commission,
            metadata
        })?;

        let record = unit.commit().await?
            .transfers
            .pop()
            .ok_or_else(|| StorageError::Task("commit returned no transfer record".to_string()))?;

        Ok(TransferReceipt { record, sender_balance, receiver_balance })
    }
}

/// Re-validates a caller-supplied amount: numeric, strictly positive and at
/// most two significant decimals, normalized to exactly two.
pub fn parse_amount(raw_amount: &str) -> Result<Money, TransferError> {
    let amount = Money::from_str(raw_amount)
        .map_err(|error| TransferError::invalid_amount(raw_amount, error))?;

    if !amount.is_positive() {
        return Err(TransferError::invalid_amount(raw_amount, "amount must be greater than zero"))
    }

    Ok(amount)
}
