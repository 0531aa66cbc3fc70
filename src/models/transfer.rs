use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AccountId, Money, TransferId};

/// An immutable ledger entry describing one committed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Store-assigned, monotonically increasing identifier.
    pub id: TransferId,
    #[serde(rename = "sender_id")]
    pub sender_account_id: AccountId,
    #[serde(rename = "receiver_id")]
    pub receiver_account_id: AccountId,
    /// Value credited to the receiver.
    pub amount: Money,
    /// Value retained by the system, debited from the sender on top of `amount`.
    pub commission_fee: Money,
    /// Commit time of the unit of work that created the record.
    pub created_at: DateTime<Utc>,
    /// Opaque payload supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>
}

impl TransferRecord {
    /// The full amount removed from the sender.
    pub fn total_debit(&self) -> Option<Money> {
        self.amount.checked_add(self.commission_fee)
    }

    pub fn involves(&self, account_id: AccountId) -> bool {
        self.sender_account_id == account_id || self.receiver_account_id == account_id
    }
}

/// A record staged inside a unit of work, before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewTransferRecord {
    pub sender_account_id: AccountId,
    pub receiver_account_id: AccountId,
    pub amount: Money,
    pub commission_fee: Money,
    pub metadata: Option<Value>
}

/// What a successful transfer hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub record: TransferRecord,
    pub sender_balance: Money,
    pub receiver_balance: Money
}
