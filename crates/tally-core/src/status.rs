//! # Order Status Machine
//!
//! Legal operational transitions and the mutability preconditions that hang
//! off the current status.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  from \ to     open  in_progress  served  paid  cancelled               │
//! │  ───────────   ────  ───────────  ──────  ────  ─────────               │
//! │  open           ·        ✓          ✓      ✓       ✓                    │
//! │  in_progress    ✓        ·          ✓      ✓       ✓                    │
//! │  served         ✓        ✓          ·      ✓       ✓                    │
//! │  paid           ✓        ✓          ✓      ·       ·                    │
//! │  cancelled      ·        ·          ·      ·       ·     (terminal)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Moving back is allowed for operational correction. Nothing leaves
//! `cancelled`. A status never transitions to itself.

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderStatus};

/// Statuses reachable from `from` by a manual status update.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        Open => &[InProgress, Served, Paid, Cancelled],
        InProgress => &[Served, Paid, Cancelled, Open],
        Served => &[Paid, InProgress, Cancelled, Open],
        Paid => &[Served, InProgress, Open],
        Cancelled => &[],
    }
}

#[inline]
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Fails with [`CoreError::InvalidStatusTransition`] for out-of-table pairs.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidStatusTransition { from, to })
    }
}

/// Items, stock, totals and promotions change only while `open`.
pub fn ensure_modifiable(order_id: &str, status: OrderStatus) -> CoreResult<()> {
    if status == OrderStatus::Open {
        Ok(())
    } else {
        Err(CoreError::OrderNotModifiable {
            order_id: order_id.to_string(),
            status,
        })
    }
}

/// [`ensure_modifiable`] for a stored order. A settled order keeps its lines
/// and totals even while it is still `open`.
pub fn ensure_editable(order: &Order) -> CoreResult<()> {
    ensure_modifiable(&order.id, order.status)?;
    if order.is_settled() {
        return Err(CoreError::OrderNotModifiable {
            order_id: order.id.clone(),
            status: order.status,
        });
    }
    Ok(())
}

/// [`check_transition`] for a stored order. Gateway settlement is final, so
/// a gateway-paid order accepts no further status updates.
pub fn check_order_transition(order: &Order, to: OrderStatus) -> CoreResult<()> {
    if order.is_gateway_settled() {
        return Err(CoreError::InvalidStatusTransition {
            from: order.status,
            to,
        });
    }
    check_transition(order.status, to)
}

/// Explicit cancellation requires an `open` order.
pub fn ensure_cancellable(order_id: &str, status: OrderStatus) -> CoreResult<()> {
    if status == OrderStatus::Open {
        Ok(())
    } else {
        Err(CoreError::OrderNotCancellable {
            order_id: order_id.to_string(),
            status,
        })
    }
}

/// Gateway flows stop once the order reached one of these.
#[inline]
pub fn is_gateway_final(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Paid | OrderStatus::Cancelled)
}
