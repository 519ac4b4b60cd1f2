//! Integer minor-unit amounts and organization currencies.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Ledger arithmetic runs on `i64` minor units (cents, yen, ...).
//! `rust_decimal::Decimal` is only used at the edges to parse and render
//! human-facing decimal strings.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building an [`Amount`] from external input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The amount is zero where a strictly positive amount is required.
    #[error("Amount must be greater than zero")]
    Zero,
    /// The amount is negative.
    #[error("Amount cannot be negative")]
    Negative,
    /// The amount has more fractional digits than the currency allows.
    #[error("Amount {value} has more precision than {currency} allows")]
    TooPrecise {
        /// The rejected value.
        value: Decimal,
        /// The currency the value was interpreted in.
        currency: Currency,
    },
    /// The amount exceeds the supported ledger range.
    #[error("Amount exceeds the supported range")]
    Overflow,
}

/// A monetary amount in integer minor units of the organization currency.
///
/// Sign is never used to encode direction on the ledger; receipts carry a
/// debit/credit kind and a strictly positive amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero minor units.
    pub const ZERO: Self = Self(0);

    /// Largest amount accepted for a single receipt or payment.
    ///
    /// Keeps every sum the ledger computes far away from `i64` overflow.
    pub const MAX: Self = Self(1_000_000_000_000_000);

    /// Wraps a raw minor-unit value.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw minor-unit value.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Validates that a raw minor-unit value is strictly positive and in range.
    pub fn positive(minor: i64) -> Result<Self, AmountError> {
        match minor {
            0 => Err(AmountError::Zero),
            m if m < 0 => Err(AmountError::Negative),
            m if m > Self::MAX.0 => Err(AmountError::Overflow),
            m => Ok(Self(m)),
        }
    }

    /// Converts a decimal in major units (e.g. `"12.50"`) to minor units.
    pub fn from_decimal(value: Decimal, currency: Currency) -> Result<Self, AmountError> {
        let scale = Decimal::from(10_i64.pow(currency.minor_unit_exponent()));
        let scaled = value.checked_mul(scale).ok_or(AmountError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(AmountError::TooPrecise { value, currency });
        }
        let minor = scaled.to_i64().ok_or(AmountError::Overflow)?;
        Self::positive(minor)
    }

    /// Renders the amount as a decimal in major units.
    #[must_use]
    pub fn to_decimal(self, currency: Currency) -> Decimal {
        Decimal::new(self.0, currency.minor_unit_exponent())
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Subtraction floored at zero.
    #[must_use]
    pub fn saturating_sub_floor(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0).max(0))
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Indonesian Rupiah
    Idr,
    /// Euro
    Eur,
    /// Singapore Dollar
    Sgd,
    /// Japanese Yen
    Jpy,
    /// Pound Sterling
    Gbp,
}

impl Currency {
    /// Number of decimal digits in one major unit (ISO 4217 exponent).
    #[must_use]
    pub const fn minor_unit_exponent(self) -> u32 {
        match self {
            Self::Jpy => 0,
            Self::Usd | Self::Idr | Self::Eur | Self::Sgd | Self::Gbp => 2,
        }
    }

    /// Returns the ISO code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Idr => "IDR",
            Self::Eur => "EUR",
            Self::Sgd => "SGD",
            Self::Jpy => "JPY",
            Self::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "IDR" => Ok(Self::Idr),
            "EUR" => Ok(Self::Eur),
            "SGD" => Ok(Self::Sgd),
            "JPY" => Ok(Self::Jpy),
            "GBP" => Ok(Self::Gbp),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}
