//! # Product Repository
//!
//! Catalog reads and relative stock writes.
//!
//! ## Locking Read
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 How a locking read works on SQLite                      │
//! │                                                                         │
//! │  UPDATE products SET stock = stock WHERE id IN (p-1, p-2)              │
//! │       │   no-op write: takes the database write lock now, so no       │
//! │       │   other unit of work can change these rows until we finish     │
//! │       ▼                                                                 │
//! │  SELECT ... FROM products WHERE id IN (p-1, p-2)                       │
//! │       │   snapshot that stays valid for the rest of the unit           │
//! │       ▼                                                                 │
//! │  UPDATE products SET stock = stock + CASE id WHEN ... END              │
//! │       WHERE id IN (...) AND stock + CASE ... END >= 0                  │
//! │           relative delta, guarded against going negative               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Category, Product, ProductOption};

const PRODUCT_COLUMNS: &str =
    "id, name, category_id, price, cost_price, stock, is_active, created_at, updated_at";

/// Repository for product, option and category rows.
pub struct ProductRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> ProductRepository<'a> {
    /// Creates a new ProductRepository.
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(product)
    }

    /// Locks and reads the given products.
    ///
    /// Missing ids are simply absent from the result; the caller decides
    /// whether that is an error.
    pub async fn lock_for_update(&mut self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Locking product rows");

        let mut touch = QueryBuilder::<Sqlite>::new("UPDATE products SET stock = stock WHERE id IN (");
        push_id_list(&mut touch, ids);
        touch.build().execute(&mut *self.conn).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        push_id_list(&mut select, ids);
        let products = select
            .build_query_as::<Product>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(products)
    }

    /// Reads the given products without locking them.
    pub async fn get_many(&mut self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        push_id_list(&mut select, ids);
        let products = select
            .build_query_as::<Product>()
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(products)
    }

    /// Reads the given options in one query.
    pub async fn options_by_ids(&mut self, ids: &[String]) -> DbResult<Vec<ProductOption>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, product_id, name, additional_price, is_active FROM product_options WHERE id IN (",
        );
        push_id_list(&mut query, ids);
        let options = query
            .build_query_as::<ProductOption>()
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(options)
    }

    /// Applies relative stock changes in one statement.
    ///
    /// ## Errors
    /// `StockConflict` if any row was not updated (missing, or the delta
    /// would take it below zero). The caller must roll back.
    pub async fn apply_stock_deltas(&mut self, deltas: &[(String, i64)]) -> DbResult<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        debug!(count = deltas.len(), "Applying stock deltas");

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE products SET stock = stock + ");
        push_delta_case(&mut query, deltas);
        query.push(", updated_at = ");
        query.push_bind(Utc::now());
        query.push(" WHERE id IN (");
        let ids: Vec<String> = deltas.iter().map(|(id, _)| id.clone()).collect();
        push_id_list(&mut query, &ids);
        query.push(" AND stock + ");
        push_delta_case(&mut query, deltas);
        query.push(" >= 0");

        let result = query.build().execute(&mut *self.conn).await?;

        let expected = deltas.len() as u64;
        if result.rows_affected() != expected {
            return Err(DbError::StockConflict {
                expected,
                updated: result.rows_affected(),
            });
        }

        Ok(())
    }

    /// Inserts a product.
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category_id, price, cost_price, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Inserts a product option.
    pub async fn insert_option(&mut self, option: &ProductOption) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO product_options (id, product_id, name, additional_price, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&option.id)
        .bind(&option.product_id)
        .bind(&option.name)
        .bind(option.additional_price)
        .bind(option.is_active)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Inserts a category.
    pub async fn insert_category(&mut self, category: &Category) -> DbResult<()> {
        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Counts products.
    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}

/// Appends `?, ?, ...)` binding every id.
pub(crate) fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

/// Appends `CASE id WHEN ? THEN ? ... ELSE 0 END`.
fn push_delta_case(query: &mut QueryBuilder<'_, Sqlite>, deltas: &[(String, i64)]) {
    query.push("CASE id");
    for (id, delta) in deltas {
        query.push(" WHEN ");
        query.push_bind(id.clone());
        query.push(" THEN ");
        query.push_bind(*delta);
    }
    query.push(" ELSE 0 END");
}

// =============================================================================
// Unit Tests
// =============================================================================
