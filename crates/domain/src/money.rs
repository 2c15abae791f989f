//! Monetary value object with currency safety.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currencies accepted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Kes,
}

impl Currency {
    /// Returns the ISO 4217 currency code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Kes => "KES",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "KES" => Ok(Currency::Kes),
            other => Err(MoneyError::UnknownCurrency {
                code: other.to_string(),
            }),
        }
    }
}

/// Errors produced by money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Arithmetic or comparison across differing currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// Division by zero.
    #[error("cannot divide money by zero")]
    DivisionByZero,

    /// Unrecognized currency code.
    #[error("unknown currency code: {code}")]
    UnknownCurrency { code: String },
}

/// Money amount in minor units (cents) paired with its currency.
///
/// All arithmetic and comparison across differing currencies fails with
/// `MoneyError::CurrencyMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g., 1000 = $10.00).
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a money amount from minor units.
    pub fn from_minor(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Creates a money amount from major units (e.g., whole dollars).
    pub fn from_major(major: i64, currency: Currency) -> Self {
        Self {
            minor: major * 100,
            currency,
        }
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Adds another amount of the same currency.
    pub fn add(self, other: Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            minor: self.minor + other.minor,
            currency: self.currency,
        })
    }

    /// Subtracts another amount of the same currency.
    pub fn subtract(self, other: Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            minor: self.minor - other.minor,
            currency: self.currency,
        })
    }

    /// Multiplies by a quantity.
    pub fn multiply(self, factor: u32) -> Money {
        Money {
            minor: self.minor * factor as i64,
            currency: self.currency,
        }
    }

    /// Divides by a divisor, rounding toward zero.
    pub fn divide(self, divisor: i64) -> Result<Money, MoneyError> {
        if divisor == 0 {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Money {
            minor: self.minor / divisor,
            currency: self.currency,
        })
    }

    /// Returns true if this amount is greater than the other.
    pub fn is_greater_than(self, other: Money) -> Result<bool, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.minor > other.minor)
    }

    /// Returns true if this amount is less than the other.
    pub fn is_less_than(self, other: Money) -> Result<bool, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.minor < other.minor)
    }

    fn require_same_currency(self, other: Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        write!(
            f,
            "{} {}{}.{:02}",
            self.currency,
            sign,
            (self.minor / 100).abs(),
            (self.minor % 100).abs()
        )
    }
}
