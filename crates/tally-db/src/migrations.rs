//! # Embedded Migrations
//!
//! SQL files under `migrations/sqlite/` (workspace root) are compiled into
//! the binary. Files are named `NNNN_description.sql` and applied in order;
//! an applied file is never edited, a change gets a new file.
//!
//! After migrating, [`verify_schema`] confirms every table the engine writes
//! to is present, so a store opened with `run_migrations(false)` against an
//! old file fails at startup instead of mid-order.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Tables an order operation may touch.
pub const REQUIRED_TABLES: &[&str] = &[
    "categories",
    "products",
    "product_options",
    "payment_methods",
    "promotions",
    "promotion_rules",
    "promotion_targets",
    "orders",
    "order_items",
    "order_item_options",
    "stock_history",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied as usize,
    })
}

/// Fails with `MigrationFailed` naming every missing table.
pub async fn verify_schema(pool: &SqlitePool) -> DbResult<()> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbError::MigrationFailed(format!(
            "missing tables: {}",
            missing.join(", ")
        )))
    }
}
