//! # Product Stock Guard
//!
//! Locks the products a unit of work touches, validates every movement
//! against the locked snapshot, then writes the relative deltas and one
//! ledger row per movement.
//!
//! ```text
//! lock(ids)            UPDATE/SELECT products in one lock pass
//!   │
//!   ▼
//! StockPlan            sell / restore against running stock (tally-core)
//!   │                  InsufficientStock before anything is written
//!   ▼
//! persist(plan)        apply_stock_deltas + stock_history.append
//! ```

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tally_core::ledger::{LockedStock, StockPlan};
use tally_core::{ActorId, Product, StockHistory};
use tally_db::repository::stock_history::generate_stock_history_id;
use tally_db::UnitOfWork;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Products locked for the rest of a unit of work.
pub struct LockedProducts {
    products: HashMap<String, Product>,
    plan: StockPlan,
}

impl LockedProducts {
    pub fn product(&self, id: &str) -> EngineResult<&Product> {
        self.products
            .get(id)
            .ok_or_else(|| EngineError::not_found("Product", id))
    }

    pub fn plan_mut(&mut self) -> &mut StockPlan {
        &mut self.plan
    }

    pub fn plan(&self) -> &StockPlan {
        &self.plan
    }
}

/// Locks every product in `ids` (duplicates allowed).
///
/// ## Errors
/// `NotFound` naming the first missing product.
pub async fn lock<'i, I>(uow: &mut UnitOfWork, ids: I) -> EngineResult<LockedProducts>
where
    I: IntoIterator<Item = &'i str>,
{
    // Sorted so concurrent units touch rows in the same order.
    let ids: Vec<String> = ids
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = uow.products().lock_for_update(&ids).await?;
    let products: HashMap<String, Product> =
        rows.into_iter().map(|p| (p.id.clone(), p)).collect();

    if let Some(missing) = ids.iter().find(|id| !products.contains_key(*id)) {
        return Err(EngineError::not_found("Product", missing.clone()));
    }

    let plan = StockPlan::new(products.values().map(|p| LockedStock {
        product_id: p.id.clone(),
        name: p.name.clone(),
        stock: p.stock,
    }));

    Ok(LockedProducts { products, plan })
}

/// Writes the planned movements. Returns the ledger rows appended.
pub async fn persist(
    uow: &mut UnitOfWork,
    plan: &StockPlan,
    order_id: &str,
    actor: Option<&ActorId>,
    note: Option<&str>,
) -> EngineResult<Vec<StockHistory>> {
    if plan.is_empty() {
        return Ok(Vec::new());
    }

    uow.products().apply_stock_deltas(&plan.deltas()).await?;

    let now = Utc::now();
    let entries: Vec<StockHistory> = plan
        .entries()
        .iter()
        .map(|draft| StockHistory {
            id: generate_stock_history_id(),
            product_id: draft.product_id.clone(),
            change_amount: draft.change_amount,
            previous_stock: draft.previous_stock,
            current_stock: draft.current_stock,
            change_type: draft.change_type,
            reference_id: Some(order_id.to_string()),
            note: note.map(str::to_string),
            actor_id: actor.map(|a| a.as_str().to_string()),
            created_at: now,
        })
        .collect();

    uow.stock_history().append(&entries).await?;

    debug!(order_id = %order_id, entries = entries.len(), "Stock movements recorded");
    Ok(entries)
}
