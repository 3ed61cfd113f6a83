//! # Payment Method Repository

use sqlx::SqliteConnection;

use crate::error::DbResult;
use tally_core::PaymentMethod;

/// Repository for payment methods.
pub struct PaymentMethodRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> PaymentMethodRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        PaymentMethodRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<PaymentMethod>> {
        let method = sqlx::query_as::<_, PaymentMethod>(
            "SELECT id, name, is_cash, is_active FROM payment_methods WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(method)
    }

    /// Active methods, by name.
    pub async fn list_active(&mut self) -> DbResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            "SELECT id, name, is_cash, is_active FROM payment_methods WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(methods)
    }

    pub async fn insert(&mut self, method: &PaymentMethod) -> DbResult<()> {
        sqlx::query("INSERT INTO payment_methods (id, name, is_cash, is_active) VALUES (?1, ?2, ?3, ?4)")
            .bind(&method.id)
            .bind(&method.name)
            .bind(method.is_cash)
            .bind(method.is_active)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
