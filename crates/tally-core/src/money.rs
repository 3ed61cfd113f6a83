//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    Every total, price and discount is an i64 count of the smallest     │
//! │    currency unit. Percentages floor explicitly, so the order engine    │
//! │    never hands out a fraction of a unit.                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_minor(10000);
//! let line = price.multiply_quantity(2).unwrap();
//! assert_eq!(line.minor_units(), 20000);
//!
//! // 10% discount, floored
//! assert_eq!(line.percentage_floor(10).minor_units(), 2000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Differences (e.g. stock returns, corrections) may be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No currency**: A Tally deployment runs in exactly one currency
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price + option surcharges ──► OrderItem.price_at_sale          │
/// │                                             │                           │
/// │                                             ▼ × quantity                │
/// │                                       OrderItem.subtotal                │
/// │                                             │ Σ                         │
/// │                                             ▼                           │
/// │  Order.gross_total ── − discount_amount ──► Order.net_total             │
/// │                                             │                           │
/// │                                             ▼                           │
/// │                             cash_received − net_total = change_due      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.minor_units(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major_part(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Multiplies money by a quantity.
    ///
    /// Catalog prices are arbitrary `i64` values, so an overflowing product
    /// is reported as invalid input rather than wrapped.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(12500);
    /// assert_eq!(unit_price.multiply_quantity(3).unwrap().minor_units(), 37500);
    /// assert!(Money::from_minor(i64::MAX).multiply_quantity(2).is_err());
    /// ```
    pub fn multiply_quantity(&self, qty: i64) -> CoreResult<Money> {
        self.checked_mul(qty).ok_or_else(|| overflow("line subtotal"))
    }

    /// Adds up `amounts`, failing instead of wrapping.
    pub fn try_sum<I>(amounts: I) -> CoreResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), Money::checked_add)
            .ok_or_else(|| overflow("total"))
    }

    /// Takes `percent` percent of this amount, rounding down.
    ///
    /// ## Rounding
    /// `floor(amount × percent / 100)`. Flooring means a percentage
    /// discount never exceeds the exact fractional value, so the shop is
    /// never short by a rounding unit.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let base = Money::from_minor(999);
    /// // 999 × 15 / 100 = 149.85 → 149
    /// assert_eq!(base.percentage_floor(15).minor_units(), 149);
    /// ```
    pub fn percentage_floor(&self, percent: i64) -> Money {
        // i128 so large totals with large percentages cannot overflow
        let product = self.0 as i128 * percent as i128;
        Money(product.div_euclid(100) as i64)
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn non_negative(self) -> Money {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows `major.minor` without a currency symbol.
///
/// ## Note
/// For logs only. Presentation layers format with their own locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            self.major_part().abs(),
            self.minor_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

fn overflow(field: &str) -> crate::error::CoreError {
    ValidationError::AmountOverflow {
        field: field.to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
