//! # Database Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error ──▶ DbError ──▶ EngineError (tally-engine)                 │
//! │                                                                         │
//! │  The engine rolls the unit of work back on any DbError, so variants     │
//! │  only need to say what kind of failure it was, not how to recover.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A keyed read or write found no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write, e.g. a gateway reference already
    /// held by another order.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A row referenced a product, option, promotion or payment method that
    /// does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the write. The schema guards negative
    /// stock, the money invariant and ledger arithmetic this way.
    #[error("Check constraint violated: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A guarded relative stock update touched fewer rows than planned.
    ///
    /// The planned delta would have taken a product below zero, or a product
    /// row vanished between the locking read and the write.
    #[error("Stock update conflict: expected {expected} rows, updated {updated}")]
    StockConflict { expected: u64, updated: u64 },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// ```text
/// RowNotFound                 → NotFound
/// Database(kind = Unique)     → UniqueViolation  (constraint = "<table>.<column>")
/// Database(kind = ForeignKey) → ForeignKeyViolation
/// Database(kind = Check)      → CheckViolation
/// Database(other)             → QueryFailed
/// PoolTimedOut                → PoolExhausted
/// PoolClosed                  → ConnectionFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        constraint: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or(message.as_str())
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    ErrorKind::CheckViolation => DbError::CheckViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
