mod config;
mod transfer_engine;

pub use config::{EngineConfig, DEFAULT_COMMISSION_RATE};
pub use crate::storage::DEFAULT_LOCK_TIMEOUT;
pub use transfer_engine::{parse_amount, TransferEngine};
