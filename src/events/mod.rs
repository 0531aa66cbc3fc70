mod notifier;
mod transfer_created;

pub use notifier::TransferNotifier;
pub use transfer_created::{Balances, TransferCreated, TRANSFER_CREATED_EVENT};
