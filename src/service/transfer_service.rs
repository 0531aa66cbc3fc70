use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::engine::{parse_amount, TransferEngine};
use crate::events::{TransferCreated, TransferNotifier};
use crate::models::TransferError;
use crate::storage::{PageRequest, TransferPage};
use crate::types::{AccountId, DECIMAL_PLACES};

/// Body of a transfer request from an already authenticated sender.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub receiver_id: AccountId,
    pub amount: String,
    #[serde(default)]
    pub metadata: Option<Value>
}

/// Request boundary in front of the engine.
///
/// Applies the caller-facing validation rules, runs the transfer, and
/// notifies both parties once it has committed.
pub struct TransferService {
    engine: Arc<TransferEngine>,
    notifier: Arc<TransferNotifier>
}

impl TransferService {
    pub fn new(engine: Arc<TransferEngine>, notifier: Arc<TransferNotifier>) -> Self {
        Self { engine, notifier }
    }

    pub fn notifier(&self) -> &Arc<TransferNotifier> {
        &self.notifier
    }

    pub async fn create_transfer(&self, sender_id: AccountId, request: TransferRequest) -> Result<TransferCreated, TransferError> {
        self.validate(sender_id, &request)?;

        let receipt = self.engine
            .execute_with_metadata(sender_id, request.receiver_id, &request.amount, request.metadata)
            .await?;

        let event = TransferCreated::from_receipt(&receipt);
        self.notifier.publish(event.clone());

        Ok(event)
    }

    pub fn list_transfers(&self, account_id: AccountId, request: PageRequest) -> Result<TransferPage, TransferError> {
        self.engine.store()
            .list_transfers(account_id, request)
            .ok_or_else(|| TransferError::account_not_found(account_id))
    }

    /// Cheap checks against committed state. The engine repeats the funds
    /// check under lock and its answer is the one that counts.
    fn validate(&self, sender_id: AccountId, request: &TransferRequest) -> Result<(), TransferError> {
        let store = self.engine.store();

        if store.account(request.receiver_id).is_none() {
            return Err(TransferError::account_not_found(request.receiver_id))
        }

        if !is_plain_amount(&request.amount) {
            return Err(TransferError::invalid_amount(&request.amount, "amount must be digits with up to two decimal places"))
        }

        let amount = parse_amount(&request.amount)?;

        if sender_id == request.receiver_id {
            return Err(TransferError::self_transfer(sender_id))
        }

        let sender = store.account(sender_id)
            .ok_or_else(|| TransferError::account_not_found(sender_id))?;

        let total_debit = self.engine.commission_for(amount)?
            .checked_add(amount)
            .ok_or_else(|| TransferError::overflow(amount))?;

        if sender.balance < total_debit {
            return Err(TransferError::insufficient_funds(&sender, total_debit))
        }

        Ok(())
    }
}

/// Matches `^\d+(\.\d{1,2})?$`.
pub(super) fn is_plain_amount(amount: &str) -> bool {
    let (integer, fraction) = match amount.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (amount, None)
    };

    let digits = |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());

    digits(integer) && fraction.is_none_or(|fraction| digits(fraction) && fraction.len() <= DECIMAL_PLACES as usize)
}

