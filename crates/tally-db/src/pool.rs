//! # Pool and Handles
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig ──► Database::new ──► SqlitePool (+ migrations, schema check) │
//! │                                    │                                    │
//! │               ┌────────────────────┼──────────────────────┐             │
//! │               ▼                    ▼                      ▼             │
//! │          db.begin()          db.session()         db.order_listing()    │
//! │          UnitOfWork          Session              list ‖ count          │
//! │          (1 tx, locks)       (plain reads)        (own connections)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! File databases run in WAL mode so order reads never wait on a unit of
//! work. Writers still take the single SQLite write lock; `busy_timeout`
//! queues a second unit of work behind the first rather than failing it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::order::OrderListing;
use crate::unit_of_work::{Session, UnitOfWork};

const MEMORY_PATH: &str = ":memory:";

/// Where the store lives and how the pool behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("./tally.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `begin()`/`session()` wait for a free connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a unit of work waits for another one's write lock.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// An isolated, migrated in-memory store.
    ///
    /// The pool holds exactly one connection that never expires, because the
    /// database vanishes with its last connection. Callers must release a
    /// `Session` before opening a `UnitOfWork`.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else {
            SqliteConnectOptions::from_str(&format!(
                "sqlite://{}",
                self.database_path.display()
            ))
            .map(|o| o.journal_mode(SqliteJournalMode::Wal).create_if_missing(true))
        }
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        // Order items, options and ledger rows rely on enforced references.
        Ok(options
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(self.connect_timeout);

        if self.is_in_memory() {
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Some(self.idle_timeout))
        }
    }
}

/// Shared handle to the order store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool, applies pending migrations and checks that every
    /// table the engine writes to exists.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening order store");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        migrations::verify_schema(&db.pool).await?;

        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a unit of work. Dropping it without `commit()` rolls back.
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(UnitOfWork::new(tx))
    }

    /// Checks out a connection for reads outside any unit of work.
    pub async fn session(&self) -> DbResult<Session> {
        Ok(Session::new(self.pool.acquire().await?))
    }

    pub fn order_listing(&self) -> OrderListing {
        OrderListing::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing order store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
