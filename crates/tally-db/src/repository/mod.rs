//! # Repository Module
//!
//! Database repository implementations for the Tally order engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories Borrow a Connection                     │
//! │                                                                         │
//! │  OrderService                                                          │
//! │       │                                                                 │
//! │       │  uow.products().lock_for_update(&ids)                          │
//! │       ▼                                                                 │
//! │  ProductRepository<'a> { conn: &'a mut SqliteConnection }              │
//! │       │                                                                 │
//! │       │  same connection whether it came from                          │
//! │       │  UnitOfWork (transaction) or Session (pooled)                  │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`] - Orders, lines, option snapshots, settlement fields
//! - [`ProductRepository`] - Locking reads, options, relative stock deltas
//! - [`PromotionRepository`] - Promotions with rules and targets
//! - [`StockHistoryRepository`] - Append-only stock ledger
//! - [`PaymentMethodRepository`] - Payment methods

pub mod order;
pub mod payment_method;
pub mod product;
pub mod promotion;
pub mod stock_history;

pub use order::{ItemQuantityUpdate, OrderFilter, OrderListing, OrderRepository};
pub use payment_method::PaymentMethodRepository;
pub use product::ProductRepository;
pub use promotion::PromotionRepository;
pub use stock_history::StockHistoryRepository;
