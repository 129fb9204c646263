//! # Money Module
//!
//! Integer-cent money and basis-point percentages for the ledger.
//!
//! ## Rounding Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ROUND EVERY MULTIPLICATION, THEN SUM                                   │
//! │                                                                         │
//! │  item:  $1.15 x 3              = $3.45                                  │
//! │  tax:   8.25% of $3.45 = 28.4625c  → 28c   (rounded right here)         │
//! │  svc:   18%  of $3.45 = 62.1c      → 62c   (rounded right here)         │
//! │  total: 345 + 28 + 62              = 435c                               │
//! │                                                                         │
//! │  Never: (345 * (1 + 0.0825 + 0.18)) rounded once at the end.            │
//! │  Reports printed by older stations add the rounded parts, so we do too. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, Percent};
//!
//! let subtotal = Money::from_cents(1800);
//! let tax = subtotal.apply_percent(Percent::from_bps(800)); // 8%
//! assert_eq!(tax.cents(), 144);
//! assert_eq!((subtotal + tax).to_string(), "$19.44");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// Serialized as a bare integer so stored documents read `"total": 1944`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Zero dollars.
    pub const ZERO: Money = Money(0);

    /// One cent, the smallest balance that still counts as "owed".
    pub const CENT: Money = Money(1);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a value from dollars and cents.
    ///
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Unit price times a count. Exact, no rounding needed.
    #[inline]
    pub const fn times(&self, count: i64) -> Self {
        Money(self.0 * count)
    }

    /// Applies a percentage and rounds to the cent right away.
    ///
    /// Halves round away from zero, so a refund rounds the same way
    /// a sale does.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, Percent};
    ///
    /// // 10% of $20.00
    /// let discount = Money::from_cents(2000).apply_percent(Percent::from_bps(1000));
    /// assert_eq!(discount.cents(), 200);
    ///
    /// // 8.25% of $10.99 = 90.6675c → 91c
    /// let tax = Money::from_cents(1099).apply_percent(Percent::from_bps(825));
    /// assert_eq!(tax.cents(), 91);
    /// ```
    pub fn apply_percent(&self, percent: Percent) -> Self {
        let product = self.0 as i128 * percent.bps() as i128;
        let half = Percent::SCALE as i128 / 2;
        let rounded = if product >= 0 {
            (product + half) / Percent::SCALE as i128
        } else {
            (product - half) / Percent::SCALE as i128
        };
        Money(rounded as i64)
    }
}

/// Rounds a decimal dollar amount half-up to the cent.
///
/// Payment processors report approved amounts as decimal strings or floats;
/// this is the single place those enter the ledger.
///
/// ```rust
/// use tally_core::money::round_to_cent;
///
/// assert_eq!(round_to_cent(10.005).cents(), 1001);
/// assert_eq!(round_to_cent(19.44).cents(), 1944);
/// assert_eq!(round_to_cent(-2.675).cents(), -268);
/// ```
pub fn round_to_cent(amount: f64) -> Money {
    // Nudge by a tiny epsilon so 10.005 (stored as 10.00499..) still rounds up.
    let scaled = amount * 100.0;
    let nudged = if scaled >= 0.0 {
        scaled + 1e-7
    } else {
        scaled - 1e-7
    };
    Money(nudged.round() as i64)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;
    fn mul(self, rhs: i64) -> Money {
        self.times(rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

// =============================================================================
// Percent Type
// =============================================================================

/// A percentage in basis points (1/100th of a percent).
///
/// | Percent | bps   |
/// |---------|-------|
/// | 8%      | 800   |
/// | 8.25%   | 825   |
/// | 18%     | 1800  |
/// | 100%    | 10000 |
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// Basis points in 100%.
    pub const SCALE: u32 = 10_000;

    pub const ZERO: Percent = Percent(0);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Whole percentage points, `from_whole(8)` is 8%.
    #[inline]
    pub const fn from_whole(percent: u32) -> Self {
        Percent(percent * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1944).to_string(), "$19.44");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_apply_percent_rounds_half_away_from_zero() {
        // 12.5% of 4c = 0.5c → 1c
        assert_eq!(Money::from_cents(4).apply_percent(Percent::from_bps(1250)).cents(), 1);
        assert_eq!(Money::from_cents(-4).apply_percent(Percent::from_bps(1250)).cents(), -1);
        // 8% of $18.00
        assert_eq!(Money::from_cents(1800).apply_percent(Percent::from_bps(800)).cents(), 144);
        assert_eq!(Money::from_cents(1800).apply_percent(Percent::ZERO).cents(), 0);
    }

    #[test]
    fn test_per_multiplication_rounding_differs_from_single_rounding() {
        // Two 0.5c fractions round up separately: 1c + 1c
        let base = Money::from_cents(5);
        let ten = Percent::from_bps(1000);
        let separate = base.apply_percent(ten) + base.apply_percent(ten);
        let combined = base.times(2).apply_percent(ten);
        assert_eq!(separate.cents(), 2);
        assert_eq!(combined.cents(), 1);
    }

    #[test]
    fn test_round_to_cent() {
        assert_eq!(round_to_cent(0.0).cents(), 0);
        assert_eq!(round_to_cent(1.234).cents(), 123);
        assert_eq!(round_to_cent(1.235).cents(), 124);
        assert_eq!(round_to_cent(-1.235).cents(), -124);
    }

    #[test]
    fn test_sum_and_ops() {
        let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 355);
        assert_eq!((Money::from_cents(300) * 3).cents(), 900);
        assert_eq!((-Money::from_cents(300)).cents(), -300);
    }

    #[test]
    fn test_percent_display() {
        assert_eq!(Percent::from_bps(800).to_string(), "8%");
        assert_eq!(Percent::from_bps(825).to_string(), "8.25%");
        assert_eq!(Percent::from_bps(1250).to_string(), "12.5%");
        assert_eq!(Percent::from_whole(18).bps(), 1800);
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_cents(1944)).unwrap();
        assert_eq!(json, "1944");
        let pct: Percent = serde_json::from_str("825").unwrap();
        assert_eq!(pct.bps(), 825);
    }
}
