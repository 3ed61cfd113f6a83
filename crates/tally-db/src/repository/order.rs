//! # Order Repository
//!
//! Database operations for orders, order items and their option snapshots.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert() → Order { status: Open, totals: 0 }                   │
//! │     └── insert_items() / insert_item_options()  (one batch each)       │
//! │     └── update_totals()                                                │
//! │                                                                         │
//! │  2. EDIT (only while open)                                             │
//! │     └── lock() → header read under the write lock                     │
//! │     └── update_item_quantities() / delete_items() / insert_items()     │
//! │     └── update_totals()                                                │
//! │                                                                         │
//! │  3. SETTLE                                                             │
//! │     └── record_manual_payment() or set_gateway_reference()             │
//! │     └── update_status_by_gateway_reference()  (webhook)                │
//! │                                                                         │
//! │  4. CANCEL                                                             │
//! │     └── mark_cancelled()                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::push_id_list;
use tally_core::{
    Order, OrderItem, OrderItemDetail, OrderItemOption, OrderStatus, OrderType,
};

const ORDER_COLUMNS: &str = "id, user_id, order_type, status, gross_total, discount_amount, \
     net_total, applied_promotion_id, payment_method_id, payment_gateway_reference, \
     cash_received, change_due, cancellation_reason, notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "oi.id AS id, oi.order_id AS order_id, oi.product_id AS product_id, \
     oi.quantity AS quantity, oi.price_at_sale AS price_at_sale, oi.subtotal AS subtotal, \
     oi.net_subtotal AS net_subtotal, oi.cost_price_at_sale AS cost_price_at_sale, \
     oi.created_at AS created_at";

#[derive(sqlx::FromRow)]
struct ItemRow {
    #[sqlx(flatten)]
    item: OrderItem,
    product_name: String,
}

/// A quantity change for an existing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuantityUpdate {
    pub item_id: String,
    pub quantity: i64,
    pub subtotal: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> OrderRepository<'a> {
    /// Creates a new OrderRepository.
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        OrderRepository { conn }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(order)
    }

    /// Reads the order header under the write lock.
    pub async fn lock(&mut self, id: &str) -> DbResult<Option<Order>> {
        sqlx::query("UPDATE orders SET status = status WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        self.get_by_id(id).await
    }

    /// Finds the order a gateway transaction belongs to.
    pub async fn get_by_gateway_reference(&mut self, reference: &str) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE payment_gateway_reference = ?1",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(reference)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(order)
    }

    /// Inserts an order header.
    pub async fn insert(&mut self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_type = %order.order_type, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_type, status,
                gross_total, discount_amount, net_total,
                applied_promotion_id, payment_method_id, payment_gateway_reference,
                cash_received, change_due, cancellation_reason, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.order_type)
        .bind(order.status)
        .bind(order.gross_total)
        .bind(order.discount_amount)
        .bind(order.net_total)
        .bind(&order.applied_promotion_id)
        .bind(&order.payment_method_id)
        .bind(&order.payment_gateway_reference)
        .bind(order.cash_received)
        .bind(order.change_due)
        .bind(&order.cancellation_reason)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Lines of an order, in insertion order.
    pub async fn items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {} FROM order_items oi WHERE oi.order_id = ?1 ORDER BY oi.rowid",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(items)
    }

    /// Lines with product names and option snapshots.
    pub async fn item_details(&mut self, order_id: &str) -> DbResult<Vec<OrderItemDetail>> {
        let sql = format!(
            "SELECT {}, p.name AS product_name \
             FROM order_items oi JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = ?1 ORDER BY oi.rowid",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.conn)
            .await?;

        let options = sqlx::query_as::<_, OrderItemOption>(
            "SELECT o.id AS id, o.order_item_id AS order_item_id, \
             o.product_option_id AS product_option_id, o.option_name AS option_name, \
             o.price_at_sale AS price_at_sale \
             FROM order_item_options o JOIN order_items oi ON oi.id = o.order_item_id \
             WHERE oi.order_id = ?1 ORDER BY o.rowid",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut by_item: HashMap<String, Vec<OrderItemOption>> = HashMap::new();
        for option in options {
            by_item
                .entry(option.order_item_id.clone())
                .or_default()
                .push(option);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let options = by_item.remove(&row.item.id).unwrap_or_default();
                OrderItemDetail {
                    item: row.item,
                    product_name: row.product_name,
                    options,
                }
            })
            .collect())
    }

    /// Inserts lines in one statement.
    pub async fn insert_items(&mut self, items: &[OrderItem]) -> DbResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        debug!(count = items.len(), "Inserting order items");

        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price_at_sale, \
             subtotal, net_subtotal, cost_price_at_sale, created_at) ",
        );
        query.push_values(items, |mut row, item| {
            row.push_bind(item.id.clone())
                .push_bind(item.order_id.clone())
                .push_bind(item.product_id.clone())
                .push_bind(item.quantity)
                .push_bind(item.price_at_sale)
                .push_bind(item.subtotal)
                .push_bind(item.net_subtotal)
                .push_bind(item.cost_price_at_sale)
                .push_bind(item.created_at);
        });
        query.build().execute(&mut *self.conn).await?;

        Ok(())
    }

    /// Inserts option snapshots in one statement.
    pub async fn insert_item_options(&mut self, options: &[OrderItemOption]) -> DbResult<()> {
        if options.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO order_item_options (id, order_item_id, product_option_id, option_name, price_at_sale) ",
        );
        query.push_values(options, |mut row, option| {
            row.push_bind(option.id.clone())
                .push_bind(option.order_item_id.clone())
                .push_bind(option.product_option_id.clone())
                .push_bind(option.option_name.clone())
                .push_bind(option.price_at_sale);
        });
        query.build().execute(&mut *self.conn).await?;

        Ok(())
    }

    /// Rewrites quantity and subtotals of existing lines in one statement.
    pub async fn update_item_quantities(&mut self, updates: &[ItemQuantityUpdate]) -> DbResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE order_items SET quantity = CASE id");
        for update in updates {
            query.push(" WHEN ").push_bind(update.item_id.clone());
            query.push(" THEN ").push_bind(update.quantity);
        }
        query.push(" END, subtotal = CASE id");
        for update in updates {
            query.push(" WHEN ").push_bind(update.item_id.clone());
            query.push(" THEN ").push_bind(update.subtotal);
        }
        query.push(" END, net_subtotal = CASE id");
        for update in updates {
            query.push(" WHEN ").push_bind(update.item_id.clone());
            query.push(" THEN ").push_bind(update.subtotal);
        }
        query.push(" END WHERE id IN (");
        let ids: Vec<String> = updates.iter().map(|u| u.item_id.clone()).collect();
        push_id_list(&mut query, &ids);

        let result = query.build().execute(&mut *self.conn).await?;
        if result.rows_affected() != updates.len() as u64 {
            return Err(DbError::not_found("OrderItem", ids.join(",")));
        }

        Ok(())
    }

    /// Deletes lines and their option snapshots.
    pub async fn delete_items(&mut self, item_ids: &[String]) -> DbResult<()> {
        if item_ids.is_empty() {
            return Ok(());
        }

        let mut options = QueryBuilder::<Sqlite>::new(
            "DELETE FROM order_item_options WHERE order_item_id IN (",
        );
        push_id_list(&mut options, item_ids);
        options.build().execute(&mut *self.conn).await?;

        let mut items = QueryBuilder::<Sqlite>::new("DELETE FROM order_items WHERE id IN (");
        push_id_list(&mut items, item_ids);
        items.build().execute(&mut *self.conn).await?;

        Ok(())
    }

    /// Persists totals and the applied promotion (None clears it).
    pub async fn update_totals(
        &mut self,
        id: &str,
        gross_total: i64,
        discount_amount: i64,
        net_total: i64,
        applied_promotion_id: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET gross_total = ?1,
                discount_amount = ?2,
                net_total = ?3,
                applied_promotion_id = ?4,
                updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(gross_total)
        .bind(discount_amount)
        .bind(net_total)
        .bind(applied_promotion_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Sets the operational status.
    pub async fn update_status(&mut self, id: &str, status: OrderStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Marks the order cancelled.
    pub async fn mark_cancelled(
        &mut self,
        id: &str,
        reason: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?1,
                cancellation_reason = ?2,
                notes = COALESCE(?3, notes),
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(OrderStatus::Cancelled)
        .bind(reason)
        .bind(notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Records a manual settlement. Only touches unsettled, non-cancelled orders.
    pub async fn record_manual_payment(
        &mut self,
        id: &str,
        payment_method_id: &str,
        cash_received: i64,
        change_due: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_method_id = ?1,
                cash_received = ?2,
                change_due = ?3,
                updated_at = ?4
            WHERE id = ?5
              AND payment_method_id IS NULL
              AND status != 'cancelled'
            "#,
        )
        .bind(payment_method_id)
        .bind(cash_received)
        .bind(change_due)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Unsettled order", id));
        }
        Ok(())
    }

    /// Stores the gateway transaction id.
    pub async fn set_gateway_reference(&mut self, id: &str, reference: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET payment_gateway_reference = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(reference)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Sets the status of the order carrying `reference`.
    pub async fn update_status_by_gateway_reference(
        &mut self,
        reference: &str,
        status: OrderStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE payment_gateway_reference = ?3",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(reference)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order with gateway reference", reference));
        }
        Ok(())
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Filters for order listing. `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub order_type: Option<OrderType>,
    pub user_id: Option<String>,
}

/// List and count reads on the pool, so they can run side by side.
#[derive(Debug, Clone)]
pub struct OrderListing {
    pool: SqlitePool,
}

impl OrderListing {
    pub fn new(pool: SqlitePool) -> Self {
        OrderListing { pool }
    }

    /// One page of orders, newest first.
    pub async fn list(&self, filter: &OrderFilter, limit: i64, offset: i64) -> DbResult<Vec<Order>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM orders WHERE 1 = 1", ORDER_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let orders = query
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Number of orders matching the filter.
    pub async fn count(&self, filter: &OrderFilter) -> DbResult<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders WHERE 1 = 1");
        push_filter(&mut query, filter);

        let count: i64 = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(order_type) = filter.order_type {
        query.push(" AND order_type = ").push_bind(order_type);
    }
    if let Some(user_id) = &filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id.clone());
    }
}

/// Generates an order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
