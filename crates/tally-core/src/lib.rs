//! # tally-core: Pure Business Logic for the Tally Order Engine
//!
//! This crate is the **rulebook** of the order engine. It contains every
//! money, status, promotion and stock rule as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 tally-engine (OrderService)                     │   │
//! │  │   create, update items, cancel, pay, promote, notify            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │ promotion │ │ status │ │ ledger │  │   │
//! │  │   │  Order  │ │  Money  │ │ evaluate  │ │ table  │ │ replay │  │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │          SQLite queries, migrations, unit of work               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, OrderItem, StockHistory, Promotion, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`status`] - Order status machine
//! - [`pricing`] - Line pricing and order totals
//! - [`settlement`] - Manual payment math and gateway status mapping
//! - [`promotion`] - Promotion applicability and discount computation
//! - [`ledger`] - Stock delta planning and ledger replay
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::pricing::{price_line, OrderTotals};
//!
//! let line = price_line(Money::from_minor(10000), &[], 2).unwrap();
//! assert_eq!(line.subtotal.minor_units(), 20000);
//!
//! let totals = OrderTotals::with_discount(line.subtotal, Money::from_minor(2000));
//! assert_eq!(totals.net.minor_units(), 18000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod settlement;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single order request.
///
/// ## Business Reason
/// Keeps a single unit of work (and its row locks) bounded in size.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a cancellation reason or note.
pub const MAX_NOTE_LENGTH: usize = 500;
