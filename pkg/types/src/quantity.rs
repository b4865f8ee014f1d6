//! Exact resource quantities ("100m", "1Gi", "2", "1e3").
//!
//! A `Quantity` is stored as a signed count of nano-units so that decimal and
//! binary suffixes compare and add without floating point. Precision finer than
//! one nano-unit is rounded up in magnitude.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;
use std::str::FromStr;

use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Decimal suffixes from largest to smallest, as powers of ten.
const DECIMAL_SUFFIXES: [(i32, &str); 10] = [
    (18, "E"),
    (15, "P"),
    (12, "T"),
    (9, "G"),
    (6, "M"),
    (3, "k"),
    (0, ""),
    (-3, "m"),
    (-6, "u"),
    (-9, "n"),
];

/// Binary suffixes from largest to smallest, as powers of two.
const BINARY_SUFFIXES: [(u32, &str); 6] = [
    (60, "Ei"),
    (50, "Pi"),
    (40, "Ti"),
    (30, "Gi"),
    (20, "Mi"),
    (10, "Ki"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must not be empty")]
    Empty,
    #[error("invalid quantity '{0}'")]
    Invalid(String),
    #[error("unknown suffix '{suffix}' in quantity '{input}'")]
    UnknownSuffix { input: String, suffix: String },
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// Notation a quantity was written in; kept so that rendering stays in the
/// same family ("2Gi" stays binary, "1500m" stays decimal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormat {
    DecimalSI,
    BinarySI,
    DecimalExponent,
}

#[derive(Debug, Clone, Copy)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    pub fn zero() -> Self {
        Self {
            nanos: 0,
            format: QuantityFormat::DecimalSI,
        }
    }

    /// A whole number of units in decimal notation.
    pub fn from_units(units: i64) -> Self {
        Self {
            nanos: i128::from(units) * NANOS_PER_UNIT,
            format: QuantityFormat::DecimalSI,
        }
    }

    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        input.parse()
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }
}

fn ceil_div(value: i128, divisor: i128) -> i128 {
    (value + divisor - 1) / divisor
}

/// Splits a suffix into (format, decimal exponent, binary shift).
fn parse_suffix(input: &str, suffix: &str) -> Result<(QuantityFormat, i32, u32), QuantityError> {
    if let Some(&(exp, _)) = DECIMAL_SUFFIXES.iter().find(|(_, s)| *s == suffix) {
        return Ok((QuantityFormat::DecimalSI, exp, 0));
    }
    if let Some(&(shift, _)) = BINARY_SUFFIXES.iter().find(|(_, s)| *s == suffix) {
        return Ok((QuantityFormat::BinarySI, 0, shift));
    }
    if suffix.len() > 1 && (suffix.starts_with('e') || suffix.starts_with('E')) {
        let exp: i32 = suffix[1..]
            .parse()
            .map_err(|_| QuantityError::UnknownSuffix {
                input: input.to_string(),
                suffix: suffix.to_string(),
            })?;
        return Ok((QuantityFormat::DecimalExponent, exp, 0));
    }
    Err(QuantityError::UnknownSuffix {
        input: input.to_string(),
        suffix: suffix.to_string(),
    })
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(QuantityError::Invalid(input.to_string()));
        }

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        let digits = format!("{}{}", int_part, frac_part);
        let digits = digits.trim_start_matches('0');
        let out_of_range = || QuantityError::OutOfRange(input.to_string());
        let mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| out_of_range())?
        };

        let (format, exp10, shift) = parse_suffix(input, suffix)?;

        // nanos = mantissa * 2^shift * 10^(9 + exp10 - frac_len)
        let scaled = mantissa
            .checked_mul(1i128 << shift)
            .ok_or_else(out_of_range)?;
        let pow = i32::try_from(frac_part.len())
            .ok()
            .and_then(|frac_len| 9i32.checked_add(exp10)?.checked_sub(frac_len))
            .ok_or_else(out_of_range)?;
        let magnitude = if pow >= 0 {
            let factor = 10i128
                .checked_pow(pow.unsigned_abs())
                .ok_or_else(out_of_range)?;
            scaled.checked_mul(factor).ok_or_else(out_of_range)?
        } else {
            match 10i128.checked_pow(pow.unsigned_abs()) {
                Some(divisor) => ceil_div(scaled, divisor),
                None => i128::from(scaled > 0),
            }
        };

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return write!(f, "0");
        }
        let sign = if self.nanos < 0 { "-" } else { "" };
        let abs = self.nanos.unsigned_abs();
        let per_unit = NANOS_PER_UNIT as u128;

        if self.format == QuantityFormat::BinarySI && abs % per_unit == 0 {
            let units = abs / per_unit;
            for (shift, suffix) in BINARY_SUFFIXES {
                if units % (1u128 << shift) == 0 {
                    return write!(f, "{}{}{}", sign, units >> shift, suffix);
                }
            }
            return write!(f, "{}{}", sign, units);
        }

        for (exp, suffix) in DECIMAL_SUFFIXES {
            let divisor = 10u128.pow((exp + 9) as u32);
            if abs % divisor == 0 {
                let value = abs / divisor;
                return match self.format {
                    QuantityFormat::DecimalExponent if exp != 0 => {
                        write!(f, "{}{}e{}", sign, value, exp)
                    }
                    _ => write!(f, "{}{}{}", sign, value, suffix),
                };
            }
        }
        write!(f, "{}{}n", sign, abs)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    /// Keeps the notation of the left operand, unless it is zero.
    fn add(self, rhs: Quantity) -> Quantity {
        Quantity {
            nanos: self.nanos.saturating_add(rhs.nanos),
            format: if self.nanos == 0 { rhs.format } else { self.format },
        }
    }
}
