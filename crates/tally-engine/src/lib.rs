//! # tally-engine: Order Transaction Engine
//!
//! Creates orders, moves stock, computes totals, applies promotions, keeps
//! the stock ledger, and reconciles payments against the order status
//! machine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         tally-engine                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      OrderService                                 │  │
//! │  │  create · update items · cancel · status · promotion · payment   │  │
//! │  └───────┬──────────────┬───────────────┬──────────────┬────────────┘  │
//! │          │              │               │              │               │
//! │  ┌───────▼──────┐ ┌─────▼──────┐ ┌──────▼──────┐ ┌─────▼───────────┐  │
//! │  │ stock guard  │ │ promotion  │ │  gateway    │ │ audit dispatch  │  │
//! │  │ lock + ledger│ │ evaluation │ │  (trait)    │ │ mpsc → logger   │  │
//! │  └───────┬──────┘ └─────┬──────┘ └─────────────┘ └─────────────────┘  │
//! │          │              │                                              │
//! │  ┌───────▼──────────────▼──────────────────────────────────────────┐  │
//! │  │   tally-db (UnitOfWork, repositories)   tally-core (pure rules) │  │
//! │  └─────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_engine::{EngineConfig, OrderService, TracingActivityLogger};
//!
//! tally_engine::telemetry::init_tracing();
//! let config = EngineConfig::load()?;
//! let service = OrderService::start(&config, gateway, Arc::new(TracingActivityLogger)).await?;
//! let detail = service.create_order(Some(actor), request).await?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod promotion;
pub mod request;
pub mod service;
pub mod stock;
pub mod telemetry;

pub use audit::{ActivityLogger, AuditAction, AuditDispatcher, AuditEvent, TracingActivityLogger};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorCode, ErrorResponse};
pub use gateway::{
    ChargeAction, ChargeResponse, GatewayError, GatewayNotification, PaymentGateway,
    ServerKeyVerifier,
};
pub use request::{
    CancelOrderRequest, CreateOrderRequest, ListOrdersQuery, ManualPaymentRequest,
    NotificationOutcome, OrderLineRequest, StockAudit, UpdateItemsRequest,
};
pub use service::{OrderService, ServiceSettings};
