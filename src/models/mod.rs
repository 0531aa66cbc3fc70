mod account;
mod errors;
mod transfer;

pub use account::Account;
pub use errors::{ErrorClass, TransferError};
pub use transfer::{NewTransferRecord, TransferReceipt, TransferRecord};
