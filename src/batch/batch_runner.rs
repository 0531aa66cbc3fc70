use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::{spawn_blocking, JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::engine::TransferEngine;
use crate::types::{AccountId, Money};

/// A single row of the accounts CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRow {
    pub account: AccountId,
    pub balance: Money
}

/// A single row of the transfers CSV.
///
/// The amount stays raw so the engine performs its own validation.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRow {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: String
}

/// Outcome counts for one batch run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: BTreeMap<&'static str, usize>
}

impl BatchSummary {
    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }
}

/// Drives a CSV of transfers through the engine, every row as its own task.
pub struct BatchRunner {
    engine: Arc<TransferEngine>,
    backpressure: usize
}

impl BatchRunner {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self {
            engine,
            backpressure: 256
        }
    }

    pub fn with_backpressure(mut self, backpressure: usize) -> Self {
        self.backpressure = backpressure.max(1);
        self
    }

    /// Opens every account listed in an `account,balance` CSV.
    ///
    /// Rows that fail to parse or to open are logged and skipped. Returns the
    /// number of accounts opened.
    pub async fn load_accounts(&self, path: &str) -> anyhow::Result<usize> {
        let (sender, mut receiver) = mpsc::channel::<AccountRow>(self.backpressure);
        let csv_handle = spawn_csv_reader(path.to_string(), sender);
        let mut opened = 0;

        while let Some(row) = receiver.recv().await {
            match self.engine.store().open_account(row.account, row.balance).await {
                Ok(_) => opened += 1,
                Err(error) => warn!("Account [{}] was not opened: {error}", row.account)
            }
        }

        if let Err(error) = csv_handle.await {
            error!("Account CSV ingestion failed: {error}");
        }

        Ok(opened)
    }

    /// Executes every transfer in a `sender,receiver,amount` CSV concurrently.
    pub async fn run(&self, path: &str) -> anyhow::Result<BatchSummary> {
        let (sender, receiver) = mpsc::channel::<TransferRow>(self.backpressure);
        let csv_handle = spawn_csv_reader(path.to_string(), sender);
        let summary = self.process_transfers(receiver).await;

        if let Err(error) = csv_handle.await {
            error!("Transfer CSV ingestion failed: {error}");
        }

        info!("Batch finished: {} succeeded, {} failed {:?}", summary.succeeded, summary.failed_total(), summary.failed);

        Ok(summary)
    }

    async fn process_transfers(&self, mut receiver: mpsc::Receiver<TransferRow>) -> BatchSummary {
        let mut tasks = JoinSet::new();

        while let Some(row) = receiver.recv().await {
            let engine = self.engine.clone();

            tasks.spawn(async move {
                engine.execute(row.sender, row.receiver, &row.amount).await
            });
        }

        let mut summary = BatchSummary::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => summary.succeeded += 1,
                Ok(Err(error)) => *summary.failed.entry(error.kind()).or_default() += 1,
                Err(error) => error!("A transfer task did not complete: {error}")
            }
        }

        summary
    }
}

fn spawn_csv_reader<T>(path: String, sender: mpsc::Sender<T>) -> JoinHandle<()>
where
    T: DeserializeOwned + Send + 'static,
{
    spawn_blocking(move || {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) => {
                error!("Error opening CSV at path: {path} | {error}");
                return;
            }
        };

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(BufReader::new(file));

        for result in reader.deserialize::<T>() {
            match result {
                Ok(row) => {
                    if sender.blocking_send(row).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    error!("CSV deserialization error: {error}");
                }
            }
        }
    })
}
