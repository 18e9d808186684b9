//! Typed fiat and token amounts
//!
//! Fiat amounts are arbitrary non-negative decimals. Token amounts are integer
//! base units at a fixed number of fractional digits, so every conversion from
//! fiat rounds toward zero exactly once and nothing downstream can round up.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Fractional digits of the settlement stable token
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Largest supported token precision; 10^18 base units still fit a u64 whole unit
pub const MAX_TOKEN_DECIMALS: u8 = 18;

/// A non-negative fiat amount owed on an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FiatAmount(Decimal);

impl FiatAmount {
    /// Wrap a decimal, rejecting negative values
    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::InvalidAmount(format!("fiat amount is negative: {}", value)));
        }
        Ok(Self(value.normalize()))
    }

    /// Convert a float, rejecting NaN, infinities and negatives
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidAmount(format!("fiat amount is not finite: {}", value)));
        }
        if value < 0.0 {
            return Err(Error::InvalidAmount(format!("fiat amount is negative: {}", value)));
        }
        let decimal = Decimal::try_from(value)
            .map_err(|e| Error::InvalidAmount(format!("{}: {}", value, e)))?;
        Self::new(decimal)
    }

    /// The underlying decimal
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for FiatAmount {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FiatAmount> for Decimal {
    fn from(value: FiatAmount) -> Self {
        value.0
    }
}

impl fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token amount in integer base units at a fixed precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTokenAmount")]
pub struct TokenAmount {
    units: u64,
    decimals: u8,
}

/// Wire form of [`TokenAmount`], checked on the way in
#[derive(Deserialize)]
struct RawTokenAmount {
    units: u64,
    decimals: u8,
}

impl TryFrom<RawTokenAmount> for TokenAmount {
    type Error = Error;

    fn try_from(raw: RawTokenAmount) -> Result<Self> {
        Self::from_units(raw.units, raw.decimals)
    }
}

impl TokenAmount {
    /// Create from raw base units
    pub fn from_units(units: u64, decimals: u8) -> Result<Self> {
        check_decimals(decimals)?;
        Ok(Self { units, decimals })
    }

    /// Convert `fiat / rate` into base units, rounding toward zero
    ///
    /// The division is carried out on integer mantissas, so the result is the
    /// exact floor of the quotient at `decimals` fractional digits.
    pub fn from_fiat(fiat: FiatAmount, rate: Decimal, decimals: u8) -> Result<Self> {
        check_decimals(decimals)?;
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("rate must be positive: {}", rate)));
        }

        let fiat = fiat.value().normalize();
        let rate = rate.normalize();

        // fiat_m / 10^fs / (rate_m / 10^rs) * 10^d
        let exponent = rate.scale() as i64 + decimals as i64 - fiat.scale() as i64;
        let fiat_m = fiat.mantissa().unsigned_abs();
        let rate_m = rate.mantissa().unsigned_abs();

        let (numerator, denominator) = if exponent >= 0 {
            (checked_scale(fiat_m, exponent as u32)?, rate_m)
        } else {
            (fiat_m, checked_scale(rate_m, exponent.unsigned_abs() as u32)?)
        };

        let units = u64::try_from(numerator / denominator)
            .map_err(|_| Error::InvalidAmount(format!("token amount out of range: {} / {}", fiat, rate)))?;

        Ok(Self { units, decimals })
    }

    /// Parse a plain decimal string such as `1.250000`
    pub fn parse(amount_str: &str, decimals: u8) -> Result<Self> {
        check_decimals(decimals)?;
        let amount_str = amount_str.trim();

        if amount_str.is_empty() {
            return Err(Error::InvalidAmount("Empty amount".to_string()));
        }

        let parts: Vec<&str> = amount_str.split('.').collect();
        if parts.len() > 2 {
            return Err(Error::InvalidAmount(format!("Multiple decimal points: {}", amount_str)));
        }

        let whole_part = parts[0];
        let frac_part = if parts.len() == 2 { parts[1] } else { "" };

        if whole_part.is_empty() && frac_part.is_empty() {
            return Err(Error::InvalidAmount(format!("No digits: {}", amount_str)));
        }
        if !whole_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidAmount(format!("Invalid whole part: {}", whole_part)));
        }
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidAmount(format!("Invalid fractional part: {}", frac_part)));
        }
        if frac_part.len() > decimals as usize {
            return Err(Error::TooManyDecimalPlaces {
                amount: amount_str.to_string(),
                max: decimals,
            });
        }

        let scale = 10u64.pow(decimals as u32);
        let whole_units: u64 = if whole_part.is_empty() {
            0
        } else {
            whole_part
                .parse::<u64>()
                .map_err(|e| Error::InvalidAmount(format!("Invalid whole part: {}", e)))?
                .checked_mul(scale)
                .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?
        };

        let frac_units: u64 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = decimals as usize);
            padded
                .parse::<u64>()
                .map_err(|e| Error::InvalidAmount(format!("Invalid fractional part: {}", e)))?
        };

        let units = whole_units
            .checked_add(frac_units)
            .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?;

        Ok(Self { units, decimals })
    }

    /// Base units
    pub fn units(&self) -> u64 {
        self.units
    }

    /// Fractional digits
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    /// Re-express at another precision, rounding toward zero when digits are dropped
    pub fn truncate_to(&self, decimals: u8) -> Result<Self> {
        check_decimals(decimals)?;
        let units = if decimals >= self.decimals {
            let factor = 10u64.pow((decimals - self.decimals) as u32);
            self.units
                .checked_mul(factor)
                .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?
        } else {
            self.units / 10u64.pow((self.decimals - decimals) as u32)
        };
        Ok(Self { units, decimals })
    }

    /// The amount as a decimal in whole tokens
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.units as i128, self.decimals as u32)
    }
}

impl fmt::Display for TokenAmount {
    /// Fixed precision, no exponent, no separators
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.units);
        }
        let scale = 10u64.pow(self.decimals as u32);
        write!(
            f,
            "{}.{:0width$}",
            self.units / scale,
            self.units % scale,
            width = self.decimals as usize
        )
    }
}

/// Format the token equivalent of a fiat amount for display next to the invoice
pub fn format_token_amount(fiat: FiatAmount, rate: Decimal, decimals: u8) -> Result<String> {
    Ok(TokenAmount::from_fiat(fiat, rate, decimals)?.to_string())
}

fn check_decimals(decimals: u8) -> Result<()> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(Error::InvalidAmount(format!(
            "token precision {} exceeds {}",
            decimals, MAX_TOKEN_DECIMALS
        )));
    }
    Ok(())
}

fn checked_scale(value: u128, exponent: u32) -> Result<u128> {
    10u128
        .checked_pow(exponent)
        .and_then(|factor| value.checked_mul(factor))
        .ok_or_else(|| Error::InvalidAmount("amount out of range".to_string()))
}
