use std::time::Duration;

use rust_decimal::Decimal;

use crate::storage::DEFAULT_LOCK_TIMEOUT;

/// 1.5%
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 3);

/// Tunables for a `TransferEngine`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Fraction of the transferred amount retained as commission.
    pub commission_rate: Decimal,
    /// Upper bound on the wait for account locks. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            commission_rate: DEFAULT_COMMISSION_RATE,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT)
        }
    }

    pub fn with_commission_rate(mut self, commission_rate: Decimal) -> Self {
        self.commission_rate = commission_rate;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = Some(lock_timeout);
        self
    }

    pub fn without_lock_timeout(mut self) -> Self {
        self.lock_timeout = None;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
