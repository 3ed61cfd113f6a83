//! # Pricing
//!
//! Line pricing and order totals.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product.price ─┐                                                       │
//! │  Σ surcharges ──┴──► unit_price (price_at_sale)                         │
//! │                          │ × quantity                                   │
//! │                          ▼                                              │
//! │                      subtotal ── Σ over lines ──► gross                 │
//! │                                                    │                    │
//! │                        discount (clamped 0..gross) ┤                    │
//! │                                                    ▼                    │
//! │                                          net = gross − discount         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::money::Money;

/// A priced line before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    /// Base price plus every selected option surcharge.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub subtotal: Money,
}

/// Prices one line from its product price and the selected option surcharges.
///
/// Fails with `AmountOverflow` when the unit price or subtotal leaves `i64`.
pub fn price_line(base_price: Money, surcharges: &[Money], quantity: i64) -> CoreResult<LinePrice> {
    let unit_price = Money::try_sum(std::iter::once(base_price).chain(surcharges.iter().copied()))?;
    Ok(LinePrice {
        unit_price,
        subtotal: unit_price.multiply_quantity(quantity)?,
    })
}

/// Order-level totals.
///
/// Construct through [`OrderTotals::from_gross`] or
/// [`OrderTotals::with_discount`]; both keep
/// `net = gross − discount` and `0 <= discount <= gross`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
}

impl OrderTotals {
    /// Totals with no discount.
    pub fn from_gross(gross: Money) -> Self {
        Self::with_discount(gross, Money::zero())
    }

    /// Totals for `gross` with `discount` clamped into `[0, gross]`.
    pub fn with_discount(gross: Money, discount: Money) -> Self {
        let gross = gross.non_negative();
        let discount = discount.non_negative().min(gross);
        OrderTotals {
            gross,
            discount,
            net: gross - discount,
        }
    }

    /// Totals recomputed from line subtotals, discount cleared.
    pub fn from_subtotals<I>(subtotals: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        Ok(Self::from_gross(Money::try_sum(subtotals)?))
    }
}
