use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("Money error: {0}")]
    InvalidFormat(String),
    #[error("Money error: {0}")]
    Parse(#[from] rust_decimal::Error),
    #[error("Money error: value [{0}] has more than two decimal places")]
    TooManyDecimalPlaces(String),
    #[error("Money error: Overflow")]
    Overflow
}
