//! # Settlement
//!
//! Manual payment math and gateway status mapping.
//!
//! ## Manual Cash Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cash method, nothing tendered (None / 0) ──► cash_received = net       │
//! │  cash method, amount tendered             ──► must be >= net            │
//! │  non-cash method                          ──► cash_received = net       │
//! │                                                                         │
//! │  change_due = cash_received − net_total                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::OrderStatus;

/// Resolved manual payment amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualSettlement {
    pub cash_received: Money,
    pub change_due: Money,
}

/// Resolves what was tendered and the change owed.
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::settlement::settle_manual;
///
/// let s = settle_manual(Money::from_minor(18000), true, Some(Money::zero())).unwrap();
/// assert_eq!(s.cash_received.minor_units(), 18000);
/// assert!(s.change_due.is_zero());
/// ```
pub fn settle_manual(
    net_total: Money,
    is_cash: bool,
    cash_received: Option<Money>,
) -> CoreResult<ManualSettlement> {
    let received = match cash_received {
        Some(amount) if is_cash && amount.is_positive() => amount,
        _ => net_total,
    };

    if received < net_total {
        return Err(CoreError::InsufficientPayment {
            net_total: net_total.minor_units(),
            received: received.minor_units(),
        });
    }

    Ok(ManualSettlement {
        cash_received: received,
        change_due: received - net_total,
    })
}

/// Maps a gateway transaction status onto the local status it settles to.
///
/// `None` means the status is intermediate (`pending`, `authorize`, ...)
/// and must not change anything.
pub fn map_gateway_status(transaction_status: &str) -> Option<OrderStatus> {
    match transaction_status.trim().to_ascii_lowercase().as_str() {
        "settlement" | "capture" => Some(OrderStatus::Paid),
        "cancel" | "deny" | "expire" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}
