//! Quantity value object with unit-of-measure safety.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Units of measure used in procurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Kilogram,
    Ton,
    Liter,
    Piece,
}

impl Unit {
    /// Returns the display symbol for this unit.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Ton => "t",
            Unit::Liter => "L",
            Unit::Piece => "pc",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Unit::Kilogram),
            "t" => Ok(Unit::Ton),
            "L" => Ok(Unit::Liter),
            "pc" => Ok(Unit::Piece),
            other => Err(format!("unknown unit: {other}")),
        }
    }
}

/// Errors produced by quantity construction and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Arithmetic or comparison across differing units.
    #[error("unit mismatch: {left} vs {right}")]
    UnitMismatch { left: Unit, right: Unit },

    /// Quantities must stay strictly positive.
    #[error("quantity amount must be positive")]
    AmountNotPositive,
}

/// An amount paired with its unit of measure.
///
/// Arithmetic across differing units fails with `QuantityError::UnitMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    amount: u32,
    unit: Unit,
}

impl Quantity {
    /// Creates a quantity; the amount must be positive.
    pub fn new(amount: u32, unit: Unit) -> Result<Self, QuantityError> {
        if amount == 0 {
            return Err(QuantityError::AmountNotPositive);
        }
        Ok(Self { amount, unit })
    }

    /// Returns the amount.
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Returns the unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Adds another quantity of the same unit.
    pub fn add(self, other: Quantity) -> Result<Quantity, QuantityError> {
        self.require_same_unit(other)?;
        Ok(Quantity {
            amount: self.amount + other.amount,
            unit: self.unit,
        })
    }

    /// Subtracts another quantity of the same unit; the result must stay positive.
    pub fn subtract(self, other: Quantity) -> Result<Quantity, QuantityError> {
        self.require_same_unit(other)?;
        if other.amount >= self.amount {
            return Err(QuantityError::AmountNotPositive);
        }
        Ok(Quantity {
            amount: self.amount - other.amount,
            unit: self.unit,
        })
    }

    /// Returns true if this quantity is greater than the other.
    pub fn is_greater_than(self, other: Quantity) -> Result<bool, QuantityError> {
        self.require_same_unit(other)?;
        Ok(self.amount > other.amount)
    }

    /// Returns true if this quantity is less than the other.
    pub fn is_less_than(self, other: Quantity) -> Result<bool, QuantityError> {
        self.require_same_unit(other)?;
        Ok(self.amount < other.amount)
    }

    fn require_same_unit(self, other: Quantity) -> Result<(), QuantityError> {
        if self.unit != other.unit {
            return Err(QuantityError::UnitMismatch {
                left: self.unit,
                right: other.unit,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}
