use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use crate::models::Account;
use crate::storage::StorageError;
use crate::types::{AccountId, Money};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid amount [{amount}]: {reason}")]
    InvalidAmount {
        amount: String,
        reason: String
    },
    #[error("Receiver must be different from sender [{account_id}]")]
    SelfTransfer {
        account_id: AccountId
    },
    #[error("Account [{account_id}] was not found")]
    AccountNotFound {
        account_id: AccountId
    },
    #[error("Insufficient funds for account [{account_id}]: balance [{balance}] does not cover [{required}]")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Money,
        required: Money
    },
    #[error("Timed out after {waited:?} waiting for account locks")]
    LockTimeout {
        waited: Duration
    },
    #[error("Storage failure: {0}")]
    StorageFailure(#[source] StorageError)
}

/// Transport-independent grouping of failures for the request boundary.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    ClientError,
    ServerError
}

impl TransferError {
    pub fn invalid_amount(amount: &str, reason: impl Display) -> Self {
        Self::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.to_string()
        }
    }

    pub fn overflow(amount: Money) -> Self {
        Self::invalid_amount(&amount.to_string(), "arithmetic overflow")
    }

    pub fn self_transfer(account_id: AccountId) -> Self {
        Self::SelfTransfer { account_id }
    }

    pub fn account_not_found(account_id: AccountId) -> Self {
        Self::AccountNotFound { account_id }
    }

    pub fn insufficient_funds(account: &Account, required: Money) -> Self {
        Self::InsufficientFunds {
            account_id: account.id,
            balance: account.balance,
            required
        }
    }

    /// Stable, machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::SelfTransfer { .. } => "self_transfer",
            Self::AccountNotFound { .. } => "account_not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::StorageFailure(_) => "storage_failure"
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AccountNotFound { .. } => ErrorClass::NotFound,
            Self::InvalidAmount { .. }
            | Self::SelfTransfer { .. }
            | Self::InsufficientFunds { .. } => ErrorClass::ClientError,
            Self::LockTimeout { .. } | Self::StorageFailure(_) => ErrorClass::ServerError
        }
    }

    /// Operational failures are worth a system log entry; the rest are
    /// ordinary business outcomes.
    pub fn is_operational(&self) -> bool {
        self.class() == ErrorClass::ServerError
    }
}

impl From<StorageError> for TransferError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::LockTimeout { waited } => Self::LockTimeout { waited },
            other => Self::StorageFailure(other)
        }
    }
}
