//! Promotion application against a locked order.
//!
//! Loads the promotion with its rules and targets, resolves each line's
//! category, and runs the pure evaluator from `tally_core::promotion`.

use std::collections::HashMap;

use chrono::Utc;
use tally_core::promotion::{evaluate, Evaluation, EvaluationInput, EvaluationLine};
use tally_core::Order;
use tally_db::UnitOfWork;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Evaluates `promotion_id` for `order` inside the caller's unit of work.
///
/// ## Errors
/// - `NotFound` if the promotion does not exist
/// - `PromotionNotApplicable` with the failing check as reason
pub async fn evaluate_for_order(
    uow: &mut UnitOfWork,
    order: &Order,
    promotion_id: &str,
) -> EngineResult<Evaluation> {
    let definition = uow
        .promotions()
        .get_definition(promotion_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Promotion", promotion_id))?;

    let items = uow.orders().items(&order.id).await?;
    let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
    let categories: HashMap<String, Option<String>> = uow
        .products()
        .get_many(&product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.category_id))
        .collect();

    let lines: Vec<EvaluationLine> = items
        .iter()
        .map(|item| EvaluationLine {
            product_id: item.product_id.clone(),
            category_id: categories.get(&item.product_id).cloned().flatten(),
            subtotal: item.subtotal(),
        })
        .collect();

    let evaluation = evaluate(
        &definition,
        EvaluationInput {
            gross_total: order.gross_total(),
            lines: &lines,
        },
        Utc::now(),
    )?;

    for skipped in &evaluation.skipped_rules {
        warn!(
            promotion_id = %promotion_id,
            rule_id = %skipped.rule_id,
            rule_type = %skipped.rule_type,
            value = %skipped.value,
            reason = %skipped.reason,
            "Promotion rule value unreadable, treated as satisfied"
        );
    }

    Ok(evaluation)
}
