use serde::Serialize;

use crate::models::{TransferReceipt, TransferRecord};
use crate::types::Money;

pub const TRANSFER_CREATED_EVENT: &str = "transaction.created";

/// Post-commit notification sent to both parties of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferCreated {
    #[serde(rename = "transaction")]
    pub transfer: TransferRecord,
    pub balances: Balances
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Balances {
    pub sender: Money,
    pub receiver: Money
}

impl TransferCreated {
    pub fn from_receipt(receipt: &TransferReceipt) -> Self {
        Self {
            transfer: receipt.record.clone(),
            balances: Balances {
                sender: receipt.sender_balance,
                receiver: receipt.receiver_balance
            }
        }
    }

    pub fn name(&self) -> &'static str {
        TRANSFER_CREATED_EVENT
    }

    /// Private per-account channels the event is addressed to.
    pub fn channels(&self) -> [String; 2] {
        [
            format!("user.{}", self.transfer.sender_account_id),
            format!("user.{}", self.transfer.receiver_account_id)
        ]
    }
}
