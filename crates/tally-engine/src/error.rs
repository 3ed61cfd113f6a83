//! # Engine Error Type
//!
//! The error taxonomy callers of the order engine see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Order Engine                       │
//! │                                                                         │
//! │  OrderService operation                                                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Unit of work                                                    │  │
//! │  │         │                                                        │  │
//! │  │  Rule violated? ──── CoreError::InsufficientStock ──┐           │  │
//! │  │         │                                           │           │  │
//! │  │  Store failed?  ──── DbError::QueryFailed ──────────┤           │  │
//! │  │         │                                           │           │  │
//! │  │  Gateway failed? ─── GatewayError::Timeout ─────────┤           │  │
//! │  │         │                                           ▼           │  │
//! │  │         │                               EngineError (+ code)   │  │
//! │  │         │                        unit dropped → rolled back    │  │
//! │  │         ▼                                                        │  │
//! │  │  commit ──────────────────────────────────────────► detail     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::{CoreError, OrderStatus, ValidationError};
use tally_db::DbError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors returned by [`crate::OrderService`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Order, promotion, product, option or payment method absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Malformed references, bad option/product pairing, bad request shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock for {name} ({product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    #[error("Order {order_id} is {status}, it can no longer be modified")]
    OrderNotModifiable { order_id: String, status: OrderStatus },

    #[error("Order {order_id} is {status}, it cannot be cancelled")]
    OrderNotCancellable { order_id: String, status: OrderStatus },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Promotion not applicable: {reason}")]
    PromotionNotApplicable { reason: String },

    #[error("Order {order_id} is already paid")]
    AlreadyPaid { order_id: String },

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment notification signature is invalid")]
    SignatureInvalid,

    /// The payment gateway call failed or timed out.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Store or transport failure. Details are logged, not surfaced.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidInput,
    InsufficientStock,
    OrderNotModifiable,
    OrderNotCancellable,
    InvalidStatusTransition,
    PromotionNotApplicable,
    AlreadyPaid,
    PaymentFailed,
    SignatureInvalid,
    GatewayError,
    Internal,
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::InvalidInput(_) => ErrorCode::InvalidInput,
            EngineError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            EngineError::OrderNotModifiable { .. } => ErrorCode::OrderNotModifiable,
            EngineError::OrderNotCancellable { .. } => ErrorCode::OrderNotCancellable,
            EngineError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            EngineError::PromotionNotApplicable { .. } => ErrorCode::PromotionNotApplicable,
            EngineError::AlreadyPaid { .. } => ErrorCode::AlreadyPaid,
            EngineError::PaymentFailed(_) => ErrorCode::PaymentFailed,
            EngineError::SignatureInvalid => ErrorCode::SignatureInvalid,
            EngineError::Gateway(_) => ErrorCode::GatewayError,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Serializable form for an outer API layer.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock for ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        ErrorResponse {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => EngineError::not_found("Product", id),
            CoreError::InsufficientStock {
                product_id,
                name,
                available,
                requested,
            } => EngineError::InsufficientStock {
                product_id,
                name,
                available,
                requested,
            },
            CoreError::InvalidStatusTransition { from, to } => {
                EngineError::InvalidStatusTransition { from, to }
            }
            CoreError::OrderNotModifiable { order_id, status } => {
                EngineError::OrderNotModifiable { order_id, status }
            }
            CoreError::OrderNotCancellable { order_id, status } => {
                EngineError::OrderNotCancellable { order_id, status }
            }
            CoreError::PromotionNotApplicable { reason } => {
                EngineError::PromotionNotApplicable { reason }
            }
            e @ CoreError::InsufficientPayment { .. } => EngineError::PaymentFailed(e.to_string()),
            e @ CoreError::LedgerBroken { .. } => {
                tracing::error!(error = %e, "Stock ledger check failed");
                EngineError::Internal(e.to_string())
            }
            CoreError::Validation(e) => EngineError::InvalidInput(e.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::UniqueViolation { constraint } => {
                EngineError::InvalidInput(format!("duplicate value for {}", constraint))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                EngineError::InvalidInput("Invalid reference".to_string())
            }
            other => {
                tracing::error!(error = %other, "Database operation failed");
                EngineError::Internal(other.to_string())
            }
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        tracing::error!(error = %err, "Payment gateway call failed");
        EngineError::Gateway(err.to_string())
    }
}
