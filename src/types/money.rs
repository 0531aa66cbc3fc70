use crate::types::errors::MoneyError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const DECIMAL_PLACES: u32 = 2;

/// An exact monetary value, always carried at two fractional digits.
///
/// Backed by `rust_decimal::Decimal` so balance and commission math never
/// touches binary floating point.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Money(Decimal);

impl Money {
    pub fn new() -> Self {
        Money(Decimal::new(0, DECIMAL_PLACES))
    }

    /// Accepts any decimal whose significant fraction fits in two places.
    ///
    /// Trailing zeros are not significant, so `1.500` is accepted as `1.50`
    /// while `1.005` is rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        let normalized = value.normalize();

        if normalized.scale() > DECIMAL_PLACES {
            return Err(MoneyError::TooManyDecimalPlaces(value.to_string()));
        }

        Money::scaled(normalized).ok_or(MoneyError::Overflow)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).and_then(Money::scaled)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).and_then(Money::scaled)
    }

    /// Applies a fractional rate and truncates the product to two places.
    pub fn commission(self, rate: Decimal) -> Result<Money, MoneyError> {
        let fee = self.0.checked_mul(rate).ok_or(MoneyError::Overflow)?;

        Money::scaled(fee.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::ToZero))
            .ok_or(MoneyError::Overflow)
    }

    // None when the value has too many integer digits to carry two places
    fn scaled(mut value: Decimal) -> Option<Money> {
        value.rescale(DECIMAL_PLACES);
        (value.scale() == DECIMAL_PLACES).then_some(Money(value))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::new()
    }
}

impl Display for Money {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(MoneyError::InvalidFormat("Value is an empty string".to_string()));
        }

        if !is_decimal_literal(value) {
            return Err(MoneyError::InvalidFormat(format!("'{value}' is not a plain decimal number")));
        }

        Money::from_decimal(Decimal::from_str(value)?)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Money::from_str(&value).map_err(de::Error::custom)
    }
}

/// `[-]digits[.digits]`, nothing else: no exponent, separators or leading `+`.
fn is_decimal_literal(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);

    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None)
    };

    let digits = |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());

    digits(integer) && fraction.is_none_or(|fraction| digits(fraction))
}
