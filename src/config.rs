use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use tracing::level_filters::LevelFilter;

use crate::engine::EngineConfig;

pub const JOURNAL_ENV: &str = "LEDGER_JOURNAL";
pub const LOCK_TIMEOUT_ENV: &str = "LEDGER_LOCK_TIMEOUT_MS";
pub const COMMISSION_RATE_ENV: &str = "LEDGER_COMMISSION_RATE";

/// Settings for the command-line driver.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub accounts_path: String,
    pub transfers_path: String,
    pub log_level: LevelFilter,
    /// Journal backing the store; in-memory when absent.
    pub journal_path: Option<PathBuf>,
    pub engine: EngineConfig
}

impl CliConfig {
    /// Builds the configuration from positional arguments and `LEDGER_*` variables.
    pub fn from_env() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        Self::from_parts(&args, |key| env::var(key).ok())
    }

    pub fn from_parts(args: &[String], lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        //NOTE: A richer CLI would justify the clap crate; two paths and a level do not
        if args.len() < 3 {
            bail!("Usage: ledger-transfer-engine [accounts].csv [transfers].csv [log_level:optional] > [balances].csv");
        }

        let log_level = args.get(3)
            .map(|s| parse_log_level(s)).unwrap_or(LevelFilter::ERROR);

        let mut engine = EngineConfig::default();

        if let Some(millis) = lookup(LOCK_TIMEOUT_ENV) {
            let millis: u64 = millis.trim().parse()
                .with_context(|| format!("{LOCK_TIMEOUT_ENV} must be a whole number of milliseconds"))?;

            engine = if millis == 0 {
                engine.without_lock_timeout()
            } else {
                engine.with_lock_timeout(Duration::from_millis(millis))
            };
        }

        if let Some(rate) = lookup(COMMISSION_RATE_ENV) {
            let rate = Decimal::from_str(rate.trim())
                .with_context(|| format!("{COMMISSION_RATE_ENV} must be a decimal fraction"))?;

            if rate.is_sign_negative() || rate >= Decimal::ONE {
                bail!("{COMMISSION_RATE_ENV} must be within [0, 1), got {rate}");
            }

            engine = engine.with_commission_rate(rate);
        }

        Ok(Self {
            accounts_path: args[1].clone(),
            transfers_path: args[2].clone(),
            log_level,
            journal_path: lookup(JOURNAL_ENV).filter(|path| !path.trim().is_empty()).map(PathBuf::from),
            engine
        })
    }
}

pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}
