//! Atomic account-to-account transfers with a percentage commission.
//!
//! A [`TransferEngine`] debits the sender by amount plus commission and
//! credits the receiver by the amount. It records a [`TransferRecord`], all
//! inside one unit of work of the [`LedgerStore`]. Account rows are locked in
//! ascending id order, so concurrent transfers that share accounts serialize
//! without deadlocking.

pub mod batch;
pub mod config;
pub mod engine;
pub mod events;
pub mod models;
pub mod service;
pub mod storage;
pub mod types;

pub use engine::{EngineConfig, TransferEngine};
pub use models::{Account, TransferError, TransferReceipt, TransferRecord};
pub use storage::LedgerStore;
pub use types::{AccountId, Money, TransferId};
