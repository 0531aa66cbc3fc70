mod errors;
mod money;

pub use errors::MoneyError;
pub use money::{Money, DECIMAL_PLACES};

pub type AccountId = u64;
pub type TransferId = u64;
