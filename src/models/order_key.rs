use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of ticks in one whole order unit.
pub const TICKS_PER_UNIT: i64 = 1_000_000;

/// Largest key magnitude, in ticks, that survives the decimal wire form
/// exactly (2^48 ticks, about 2.8e8 units).
pub const MAX_TICKS: i64 = 1 << 48;

/// Fixed-point position of a node among its siblings.
///
/// Keys are stored as a signed count of micro-units, so comparison is exact and
/// total. On the wire they appear as plain JSON numbers (`100.0001`); values are
/// rounded to the nearest tick when parsed.
///
/// Gaps between keys (spacing, thresholds) are expressed with the same type.
/// Keys outside `±MAX_TICKS` cannot be parsed and are never allocated, since
/// neighbouring values there would collapse onto the same JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct OrderKey(i64);

/// A floating-point value that cannot be represented as an [`OrderKey`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("order key {0} is not representable")]
pub struct KeyRangeError(pub f64);

impl OrderKey {
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    pub const fn from_units(units: i32) -> Self {
        Self(units as i64 * TICKS_PER_UNIT)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_UNIT as f64
    }

    /// Whether the key is within `±MAX_TICKS`.
    pub const fn is_exact(self) -> bool {
        self.0 >= -MAX_TICKS && self.0 <= MAX_TICKS
    }

    /// Sum, or `None` when it leaves the exact range.
    pub fn checked_add(self, gap: OrderKey) -> Option<OrderKey> {
        self.0.checked_add(gap.0).map(Self).filter(|k| k.is_exact())
    }

    /// Difference, or `None` when it leaves the exact range.
    pub fn checked_sub(self, gap: OrderKey) -> Option<OrderKey> {
        self.0.checked_sub(gap.0).map(Self).filter(|k| k.is_exact())
    }

    /// Distance from `self` up to `upper`; negative when `upper` sorts first.
    pub fn gap_to(self, upper: OrderKey) -> i128 {
        upper.0 as i128 - self.0 as i128
    }

    /// Midpoint, rounded down.
    pub fn midpoint(self, other: OrderKey) -> OrderKey {
        let mid = (self.0 as i128 + other.0 as i128).div_euclid(2);
        // Always within [min, max] of two i64 values.
        Self(mid as i64)
    }
}

impl TryFrom<f64> for OrderKey {
    type Error = KeyRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let ticks = (value * TICKS_PER_UNIT as f64).round();
        if !ticks.is_finite() || ticks.abs() > MAX_TICKS as f64 {
            return Err(KeyRangeError(value));
        }
        Ok(Self(ticks as i64))
    }
}

impl From<OrderKey> for f64 {
    fn from(key: OrderKey) -> Self {
        key.as_f64()
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / TICKS_PER_UNIT as u64;
        let frac = abs % TICKS_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}
