use std::io::{stderr, stdout, BufWriter, Write};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use ledger_transfer_engine::batch::BatchRunner;
use ledger_transfer_engine::config::CliConfig;
use ledger_transfer_engine::{LedgerStore, TransferEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error:#}");
            eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
            exit(1);
        }
    };

    setup_logging(config.log_level);

    let store = match &config.journal_path {
        Some(path) => LedgerStore::open(path)?,
        None => LedgerStore::in_memory()
    };
    let store = Arc::new(store.with_lock_timeout(config.engine.lock_timeout));

    let engine = Arc::new(TransferEngine::with_config(store.clone(), config.engine));
    let runner = BatchRunner::new(engine);

    let opened = runner.load_accounts(&config.accounts_path).await?;
    info!("Opened {opened} accounts");

    let timer = Instant::now();
    let summary = runner.run(&config.transfers_path).await?;
    let duration = timer.elapsed();

    info!("Processed {} transfers in: {duration:?}", summary.succeeded + summary.failed_total());

    write_results_to_stdout(&store)?;

    Ok(())
}

fn setup_logging(level: LevelFilter) {
    //NOTE: Balances go to stdout, so logging has to use stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_results_to_stdout(store: &LedgerStore) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());

    writeln!(output, "account,balance")?;

    for account in store.accounts() {
        writeln!(output, "{},{}", account.id, account.balance)?;
    }

    output.flush()?;

    Ok(())
}
