use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "CNY";
pub const CURRENCY_SYMBOL: &str = "¥";

/// A monetary amount, stored in the smallest currency unit (fen, 1/100 yuan).
///
/// All price arithmetic in the store is integer arithmetic on this type. Decimal strings only appear at the edges,
/// i.e. the `money` parameter sent to the payment gateway and the amounts admins type into coupon forms.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{CURRENCY_SYMBOL}{}", self.abs().to_decimal_string())
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    /// Parses a decimal yuan string such as `"180"`, `"180.5"` or `"180.00"`. More than two decimal places is an
    /// error rather than a silent rounding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || AmountConversionError(s.to_string());
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse::<i64>().map_err(|_| err())?,
        };
        let cents = whole.checked_mul(100).and_then(|v| v.checked_add(frac)).ok_or_else(err)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Amount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_yuan(yuan: i64) -> Self {
        Self(yuan * 100)
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self * rhs`, or `None` if the result does not fit.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// The fraction of this amount given in basis points (1/100 of a percent), truncated towards zero. `None` if the
    /// result does not fit.
    pub fn basis_points(&self, bp: i64) -> Option<Self> {
        let value = i128::from(self.0) * i128::from(bp) / 10_000;
        i64::try_from(value).ok().map(Self)
    }

    /// Subtraction that clamps at zero.
    pub fn saturating_sub_to_zero(self, rhs: Self) -> Self {
        Self((self.0 - rhs.0).max(0))
    }

    /// Formats the amount in yuan with exactly two decimal places, without a currency symbol.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
