//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tally-engine errors                                                   │
//! │  └── EngineError      - What callers of the order engine see           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                          DbError ───┴──► EngineError → Caller          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A product referenced by the operation was not part of the locked set.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete the operation.
    ///
    /// ## When This Occurs
    /// - Creating an order for more units than the locked stock
    /// - Raising a line quantity beyond the remaining stock
    #[error("Insufficient stock for {name} ({product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Items, totals or promotions can only change while the order is open.
    #[error("Order {order_id} is {status}, it can no longer be modified")]
    OrderNotModifiable { order_id: String, status: OrderStatus },

    /// Cancellation requires an open order.
    #[error("Order {order_id} is {status}, it cannot be cancelled")]
    OrderNotCancellable { order_id: String, status: OrderStatus },

    /// The promotion failed its window or rule checks.
    #[error("Promotion not applicable: {reason}")]
    PromotionNotApplicable { reason: String },

    /// Cash handed over does not cover the order.
    #[error("Insufficient payment: net total {net_total}, received {received}")]
    InsufficientPayment { net_total: i64, received: i64 },

    /// A product's stock history does not chain.
    #[error("Stock ledger broken for {product_id}: {reason}")]
    LedgerBroken { product_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before a unit of work is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An amount left the representable range.
    #[error("{field} exceeds the largest representable amount")]
    AmountOverflow { field: String },

    /// Value appears more than once where it must be unique.
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
