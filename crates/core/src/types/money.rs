//! Monetary amounts in Argentine pesos.
//!
//! Amounts are exact decimals. They are stored as TEXT in `SQLite` so no
//! precision is lost between the ingestion API, the price history, and
//! the PDF totals.

use core::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Error parsing a stored amount.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid amount: {0}")]
pub struct MoneyError(String);

/// A peso amount.
///
/// Serializes as a JSON number so API clients keep receiving
/// `"total": 1500.5` rather than a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    /// Zero pesos.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiply a unit price by a quantity, which may be fractional.
    #[must_use]
    pub fn times(self, quantity: impl Into<Decimal>) -> Self {
        Self(self.0 * quantity.into())
    }

    /// Canonical string used for storage (`"1234.5"`).
    #[must_use]
    pub fn to_storage(&self) -> String {
        self.0.normalize().to_string()
    }

    /// Format as Argentine currency: `$1.234,56`.
    ///
    /// Thousands are grouped with `.` and the two decimals follow a `,`.
    #[must_use]
    pub fn format_ars(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let plain = format!("{:.2}", rounded.abs());
        let (int_part, dec_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if negative { "-" } else { "" };
        format!("{sign}${grouped},{dec_part}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_ars())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|_| MoneyError(s.to_owned()))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|m| m.0).sum())
    }
}
