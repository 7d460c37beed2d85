//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! Floating point cannot represent retail arithmetic exactly
//! (`0.1 + 0.2 != 0.3`), and a ledger that drifts by a cent per operation is
//! useless as an audit trail. Every monetary value in the system is an
//! integer amount of the smallest currency unit (cents), stored as `i64`.
//! Only a UI converts to display units.
//!
//! ## Usage
//! ```rust
//! use almacen_core::money::Money;
//!
//! let price = Money::from_cents(4_990);
//! let line = price.checked_mul(3).unwrap();
//! assert_eq!(line.cents(), 14_970);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: adjustments and audit deltas can be negative
/// - **Single-field tuple struct**: zero-cost abstraction over i64
/// - **Transparent serde**: serializes as a plain integer, the same shape the
///   database stores
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Zero amount.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Checks whether the amount is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks whether the amount is strictly positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks whether the amount is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ## Why Checked?
    /// Line totals are `unit_price × quantity` with caller-supplied numbers.
    /// Overflow must become a validation error, never a wrapped total.
    #[inline]
    pub fn checked_mul(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds another amount, returning `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// Used for debt arithmetic: an abono larger than the remaining debt
    /// leaves the debt at exactly zero, never negative.
    #[inline]
    pub fn saturating_sub_zero(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Clamps the amount into `[lo, hi]`.
    #[inline]
    pub fn clamp(self, lo: Money, hi: Money) -> Money {
        Money(self.0.clamp(lo.0, hi.0))
    }
}

// =============================================================================
// Operators
// =============================================================================
// Plain `+`/`-` are kept for test ergonomics and trusted internal math;
// anything touching caller input goes through the checked constructors above.

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

impl fmt::Display for Money {
    /// Formats as major.minor units, e.g. `1099` -> `$10.99`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Money(cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let m = Money::from_cents(1099);
        assert_eq!(m.cents(), 1099);
        assert!(m.is_positive());
    }

    #[test]
    fn test_checked_mul_overflow() {
        assert_eq!(
            Money::from_cents(100).checked_mul(5),
            Some(Money::from_cents(500))
        );
        assert_eq!(Money::from_cents(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn test_saturating_sub_zero() {
        let debt = Money::from_cents(60_000);
        assert_eq!(
            debt.saturating_sub_zero(Money::from_cents(40_000)),
            Money::from_cents(20_000)
        );
        // Overpayment floors at zero, never negative
        assert_eq!(
            debt.saturating_sub_zero(Money::from_cents(100_000)),
            Money::zero()
        );
    }

    #[test]
    fn test_clamp() {
        let discount = Money::from_cents(5_000);
        let subtotal = Money::from_cents(3_000);
        assert_eq!(discount.clamp(Money::zero(), subtotal), subtotal);
        assert_eq!(
            Money::from_cents(-10).clamp(Money::zero(), subtotal),
            Money::zero()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }
}
