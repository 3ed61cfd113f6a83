//! # Promotion Repository
//!
//! Loads a promotion together with its rules and targets.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use tally_core::promotion::PromotionDefinition;
use tally_core::{Promotion, PromotionRule, PromotionTarget};

/// Repository for promotions.
pub struct PromotionRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> PromotionRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        PromotionRepository { conn }
    }

    /// Gets a promotion header by ID.
    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(
            "SELECT id, name, scope, discount_type, discount_value, max_discount_amount, \
             start_date, end_date, is_active FROM promotions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(promotion)
    }

    /// Gets a promotion with its rules (in insertion order) and targets.
    pub async fn get_definition(&mut self, id: &str) -> DbResult<Option<PromotionDefinition>> {
        let Some(promotion) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let rules = sqlx::query_as::<_, PromotionRule>(
            "SELECT id, promotion_id, rule_type, value FROM promotion_rules \
             WHERE promotion_id = ?1 ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        let targets = sqlx::query_as::<_, PromotionTarget>(
            "SELECT id, promotion_id, target_type, target_id FROM promotion_targets \
             WHERE promotion_id = ?1 ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&mut *self.conn)
        .await?;

        debug!(
            promotion_id = %id,
            rules = rules.len(),
            targets = targets.len(),
            "Loaded promotion definition"
        );

        Ok(Some(PromotionDefinition {
            promotion,
            rules,
            targets,
        }))
    }

    /// Inserts a promotion with its rules and targets.
    pub async fn insert(&mut self, definition: &PromotionDefinition) -> DbResult<()> {
        let p = &definition.promotion;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, name, scope, discount_type, discount_value, max_discount_amount,
                start_date, end_date, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&p.id)
        .bind(&p.name)
        .bind(p.scope)
        .bind(p.discount_type)
        .bind(p.discount_value)
        .bind(p.max_discount_amount)
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(p.is_active)
        .execute(&mut *self.conn)
        .await?;

        for rule in &definition.rules {
            sqlx::query(
                "INSERT INTO promotion_rules (id, promotion_id, rule_type, value) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&rule.id)
            .bind(&rule.promotion_id)
            .bind(rule.rule_type)
            .bind(&rule.value)
            .execute(&mut *self.conn)
            .await?;
        }

        for target in &definition.targets {
            sqlx::query(
                "INSERT INTO promotion_targets (id, promotion_id, target_type, target_id) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&target.id)
            .bind(&target.promotion_id)
            .bind(target.target_type)
            .bind(&target.target_id)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }
}
