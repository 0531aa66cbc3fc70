mod batch_runner;

pub use batch_runner::{AccountRow, BatchRunner, BatchSummary, TransferRow};
