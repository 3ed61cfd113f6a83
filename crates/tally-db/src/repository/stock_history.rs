//! # Stock History Repository
//!
//! Append-only access to the stock ledger. There is no update or delete.
//!
//! Entries are read back in insertion order (`rowid`), which is the order
//! the ledger must be replayed in.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::StockHistory;

const HISTORY_COLUMNS: &str = "id, product_id, change_amount, previous_stock, current_stock, \
     change_type, reference_id, note, actor_id, created_at";

/// Repository for the stock ledger.
pub struct StockHistoryRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> StockHistoryRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        StockHistoryRepository { conn }
    }

    /// Appends entries in one statement, preserving slice order.
    pub async fn append(&mut self, entries: &[StockHistory]) -> DbResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        debug!(count = entries.len(), "Appending stock ledger entries");

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO stock_history ({}) ",
            HISTORY_COLUMNS
        ));
        query.push_values(entries, |mut row, entry| {
            row.push_bind(entry.id.clone())
                .push_bind(entry.product_id.clone())
                .push_bind(entry.change_amount)
                .push_bind(entry.previous_stock)
                .push_bind(entry.current_stock)
                .push_bind(entry.change_type)
                .push_bind(entry.reference_id.clone())
                .push_bind(entry.note.clone())
                .push_bind(entry.actor_id.clone())
                .push_bind(entry.created_at);
        });
        query.build().execute(&mut *self.conn).await?;

        Ok(())
    }

    /// Entries for a product in creation order, at most `limit` (oldest first).
    pub async fn for_product(&mut self, product_id: &str, limit: i64) -> DbResult<Vec<StockHistory>> {
        let sql = format!(
            "SELECT {} FROM stock_history WHERE product_id = ?1 ORDER BY rowid LIMIT ?2",
            HISTORY_COLUMNS
        );
        let entries = sqlx::query_as::<_, StockHistory>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }

    /// Entries caused by one order, in creation order.
    pub async fn for_reference(&mut self, reference_id: &str) -> DbResult<Vec<StockHistory>> {
        let sql = format!(
            "SELECT {} FROM stock_history WHERE reference_id = ?1 ORDER BY rowid",
            HISTORY_COLUMNS
        );
        let entries = sqlx::query_as::<_, StockHistory>(&sql)
            .bind(reference_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }
}

/// Generates a ledger entry ID.
pub fn generate_stock_history_id() -> String {
    Uuid::new_v4().to_string()
}
