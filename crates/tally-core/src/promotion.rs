//! # Promotion Evaluator
//!
//! Decides whether a promotion applies to an order and how much it takes off.
//!
//! ## Evaluation Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. is_active && start_date <= now < end_date     else NotApplicable    │
//! │  2. every rule satisfied (AND)                    else NotApplicable    │
//! │     └── unparseable value → skipped, reported back to the caller       │
//! │  3. base                                                                │
//! │     ├── scope order: gross_total                                        │
//! │     └── scope item:  Σ subtotal of lines matching any target           │
//! │  4. raw discount                                                        │
//! │     ├── percentage:   floor(base × value / 100)                         │
//! │     └── fixed_amount: value                                             │
//! │  5. min(raw, max_discount_amount), then min(.., gross_total)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loading the promotion (and `NotFound`) is the caller's job; this module
//! only sees data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    DiscountType, Promotion, PromotionRule, PromotionRuleType, PromotionScope, PromotionTarget,
    PromotionTargetType,
};

/// An order line resolved to its product's category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationLine {
    pub product_id: String,
    pub category_id: Option<String>,
    pub subtotal: Money,
}

/// The order as the evaluator sees it.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub gross_total: Money,
    pub lines: &'a [EvaluationLine],
}

/// A promotion with its rules and targets.
#[derive(Debug, Clone)]
pub struct PromotionDefinition {
    pub promotion: Promotion,
    pub rules: Vec<PromotionRule>,
    pub targets: Vec<PromotionTarget>,
}

/// A rule whose value could not be parsed and was treated as satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_id: String,
    pub rule_type: PromotionRuleType,
    pub value: String,
    pub reason: String,
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Final discount, already capped and clamped to the gross total.
    pub discount: Money,
    pub skipped_rules: Vec<SkippedRule>,
}

/// Runs the applicability checks and computes the discount.
pub fn evaluate(
    definition: &PromotionDefinition,
    input: EvaluationInput<'_>,
    now: DateTime<Utc>,
) -> CoreResult<Evaluation> {
    let promotion = &definition.promotion;

    check_window(promotion, now)?;

    let mut skipped_rules = Vec::new();
    for rule in &definition.rules {
        match check_rule(rule, &input) {
            RuleOutcome::Satisfied => {}
            RuleOutcome::Unmet(reason) => return Err(not_applicable(reason)),
            RuleOutcome::Unparseable(reason) => skipped_rules.push(SkippedRule {
                rule_id: rule.id.clone(),
                rule_type: rule.rule_type,
                value: rule.value.clone(),
                reason,
            }),
        }
    }

    let base = discount_base(definition, &input)?;

    let raw = match promotion.discount_type {
        DiscountType::Percentage => base.percentage_floor(promotion.discount_value),
        DiscountType::FixedAmount => Money::from_minor(promotion.discount_value),
    };

    let capped = match promotion.max_discount_amount {
        Some(cap) => raw.min(Money::from_minor(cap)),
        None => raw,
    };

    Ok(Evaluation {
        discount: capped.non_negative().min(input.gross_total.non_negative()),
        skipped_rules,
    })
}

fn not_applicable(reason: impl Into<String>) -> CoreError {
    CoreError::PromotionNotApplicable {
        reason: reason.into(),
    }
}

fn check_window(promotion: &Promotion, now: DateTime<Utc>) -> CoreResult<()> {
    if !promotion.is_active {
        return Err(not_applicable("promotion is not active"));
    }
    if now < promotion.start_date {
        return Err(not_applicable(format!(
            "promotion starts at {}",
            promotion.start_date.to_rfc3339()
        )));
    }
    if now >= promotion.end_date {
        return Err(not_applicable(format!(
            "promotion ended at {}",
            promotion.end_date.to_rfc3339()
        )));
    }
    Ok(())
}

enum RuleOutcome {
    Satisfied,
    Unmet(String),
    Unparseable(String),
}

fn check_rule(rule: &PromotionRule, input: &EvaluationInput<'_>) -> RuleOutcome {
    let value = rule.value.trim();

    match rule.rule_type {
        PromotionRuleType::MinimumOrderAmount => match value.parse::<i64>() {
            Ok(minimum) if input.gross_total.minor_units() >= minimum => RuleOutcome::Satisfied,
            Ok(minimum) => RuleOutcome::Unmet(format!(
                "order total {} is below the minimum of {}",
                input.gross_total,
                Money::from_minor(minimum)
            )),
            Err(e) => RuleOutcome::Unparseable(format!("not an integer amount: {}", e)),
        },
        PromotionRuleType::RequiredProduct => {
            if value.is_empty() {
                RuleOutcome::Unparseable("empty product id".to_string())
            } else if input.lines.iter().any(|line| line.product_id == value) {
                RuleOutcome::Satisfied
            } else {
                RuleOutcome::Unmet(format!("order does not contain product {}", value))
            }
        }
        PromotionRuleType::RequiredCategory => {
            if value.is_empty() {
                RuleOutcome::Unparseable("empty category id".to_string())
            } else if input
                .lines
                .iter()
                .any(|line| line.category_id.as_deref() == Some(value))
            {
                RuleOutcome::Satisfied
            } else {
                RuleOutcome::Unmet(format!("order has no item in category {}", value))
            }
        }
    }
}

fn matches_target(line: &EvaluationLine, target: &PromotionTarget) -> bool {
    match target.target_type {
        PromotionTargetType::Product => line.product_id == target.target_id,
        PromotionTargetType::Category => line.category_id.as_deref() == Some(&target.target_id),
    }
}

fn discount_base(definition: &PromotionDefinition, input: &EvaluationInput<'_>) -> CoreResult<Money> {
    match definition.promotion.scope {
        PromotionScope::Order => Ok(input.gross_total),
        PromotionScope::Item => {
            let matched: Vec<Money> = input
                .lines
                .iter()
                .filter(|line| definition.targets.iter().any(|t| matches_target(line, t)))
                .map(|line| line.subtotal)
                .collect();
            if matched.is_empty() {
                Err(not_applicable("no order item matches the promotion targets"))
            } else {
                Money::try_sum(matched)
            }
        }
    }
}
