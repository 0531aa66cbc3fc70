use serde::{Deserialize, Serialize};

use crate::models::errors::TransferError;
use crate::types::{AccountId, Money};

/// The stored balance of a single account.
///
/// The balance is the source of truth for what an account holds. It is never
/// recomputed from transfer history.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The unique, positive identifier of the account.
    pub id: AccountId,
    /// Current funds, never negative once committed.
    pub balance: Money
}

impl Account {
    pub fn new(id: AccountId, balance: Money) -> Self {
        Self { id, balance }
    }

    /// Removes `total_debit` from the balance.
    ///
    /// # Errors
    /// Returns `TransferError::InsufficientFunds` if the balance does not cover
    /// the debit. The balance is left untouched in that case.
    pub fn debit(&mut self, total_debit: Money) -> Result<(), TransferError> {
        if self.balance < total_debit {
            return Err(TransferError::insufficient_funds(self, total_debit))
        }

        self.balance = self.balance.checked_sub(total_debit)
            .ok_or_else(|| TransferError::overflow(total_debit))?;

        Ok(())
    }

    pub fn credit(&mut self, amount: Money) -> Result<(), TransferError> {
        self.balance = self.balance.checked_add(amount)
            .ok_or_else(|| TransferError::overflow(amount))?;

        Ok(())
    }
}
