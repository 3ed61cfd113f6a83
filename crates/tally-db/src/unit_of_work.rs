//! # Unit of Work
//!
//! A transactional handle that exposes the same repositories as plain
//! pooled reads.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.begin() ──► UnitOfWork                                              │
//! │                    │                                                    │
//! │                    ├── orders()          ─┐                             │
//! │                    ├── products()         │  all borrow the same        │
//! │                    ├── promotions()       ├─ transaction connection     │
//! │                    ├── stock_history()    │                             │
//! │                    └── payment_methods() ─┘                             │
//! │                    │                                                    │
//! │          ┌─────────┴─────────┐                                          │
//! │          ▼                   ▼                                          │
//! │      commit()         rollback() / drop                                 │
//! │   (all or nothing)    (nothing survives)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories borrow the connection mutably, so only one is alive at a
//! time and no second connection is ever needed inside a unit.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::order::OrderRepository;
use crate::repository::payment_method::PaymentMethodRepository;
use crate::repository::product::ProductRepository;
use crate::repository::promotion::PromotionRepository;
use crate::repository::stock_history::StockHistoryRepository;

/// One atomic group of reads and writes.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork { tx }
    }

    /// Raw access for statements no repository covers.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn orders(&mut self) -> OrderRepository<'_> {
        OrderRepository::new(&mut self.tx)
    }

    pub fn products(&mut self) -> ProductRepository<'_> {
        ProductRepository::new(&mut self.tx)
    }

    pub fn promotions(&mut self) -> PromotionRepository<'_> {
        PromotionRepository::new(&mut self.tx)
    }

    pub fn stock_history(&mut self) -> StockHistoryRepository<'_> {
        StockHistoryRepository::new(&mut self.tx)
    }

    pub fn payment_methods(&mut self) -> PaymentMethodRepository<'_> {
        PaymentMethodRepository::new(&mut self.tx)
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}

/// A pooled connection outside any transaction.
pub struct Session {
    conn: PoolConnection<Sqlite>,
}

impl Session {
    pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
        Session { conn }
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub fn orders(&mut self) -> OrderRepository<'_> {
        OrderRepository::new(&mut self.conn)
    }

    pub fn products(&mut self) -> ProductRepository<'_> {
        ProductRepository::new(&mut self.conn)
    }

    pub fn promotions(&mut self) -> PromotionRepository<'_> {
        PromotionRepository::new(&mut self.conn)
    }

    pub fn stock_history(&mut self) -> StockHistoryRepository<'_> {
        StockHistoryRepository::new(&mut self.conn)
    }

    pub fn payment_methods(&mut self) -> PaymentMethodRepository<'_> {
        PaymentMethodRepository::new(&mut self.conn)
    }
}
