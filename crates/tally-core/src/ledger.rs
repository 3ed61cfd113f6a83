//! # Stock Ledger
//!
//! Plans stock movements against a locked snapshot and checks that a
//! product's history chains.
//!
//! ## Planning Against the Locked Snapshot
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  locked rows ──► StockPlan::new                                         │
//! │                     │                                                   │
//! │                     ├── apply(p-1, −2, sale)    stock 10 → 8            │
//! │                     ├── apply(p-2, +1, return)  stock  4 → 5            │
//! │                     │        (fails with InsufficientStock if < 0)      │
//! │                     ▼                                                   │
//! │                 entries()  one draft per movement, before/after values │
//! │                 deltas()   net relative change per product             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan never writes anything. The caller persists `deltas()` as relative
//! updates and `entries()` as ledger rows in the same unit of work.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{StockChangeType, StockHistory};

/// A product row read under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedStock {
    pub product_id: String,
    pub name: String,
    pub stock: i64,
}

/// A ledger row waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntryDraft {
    pub product_id: String,
    pub change_amount: i64,
    pub previous_stock: i64,
    pub current_stock: i64,
    pub change_type: StockChangeType,
}

/// Stock movements planned inside one unit of work.
#[derive(Debug, Clone)]
pub struct StockPlan {
    locked: HashMap<String, LockedStock>,
    running: HashMap<String, i64>,
    entries: Vec<LedgerEntryDraft>,
}

impl StockPlan {
    pub fn new(locked: impl IntoIterator<Item = LockedStock>) -> Self {
        let locked: HashMap<String, LockedStock> = locked
            .into_iter()
            .map(|row| (row.product_id.clone(), row))
            .collect();
        let running = locked
            .values()
            .map(|row| (row.product_id.clone(), row.stock))
            .collect();

        StockPlan {
            locked,
            running,
            entries: Vec::new(),
        }
    }

    /// Stock as currently planned for `product_id`.
    pub fn stock_of(&self, product_id: &str) -> Option<i64> {
        self.running.get(product_id).copied()
    }

    /// Records a movement. Zero deltas are ignored.
    ///
    /// ## Errors
    /// - `ProductNotFound` if the product was not locked
    /// - `InsufficientStock` if the movement would take stock below zero
    pub fn apply(
        &mut self,
        product_id: &str,
        change_amount: i64,
        change_type: StockChangeType,
    ) -> CoreResult<()> {
        let previous = self
            .running
            .get(product_id)
            .copied()
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if change_amount == 0 {
            return Ok(());
        }

        let current = previous + change_amount;
        if current < 0 {
            let name = self
                .locked
                .get(product_id)
                .map(|row| row.name.clone())
                .unwrap_or_default();
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                name,
                available: previous,
                requested: -change_amount,
            });
        }

        self.running.insert(product_id.to_string(), current);
        self.entries.push(LedgerEntryDraft {
            product_id: product_id.to_string(),
            change_amount,
            previous_stock: previous,
            current_stock: current,
            change_type,
        });
        Ok(())
    }

    /// Takes `quantity` units out for a sale.
    pub fn sell(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        self.apply(product_id, -quantity, StockChangeType::Sale)
    }

    /// Puts `quantity` units back.
    pub fn restore(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        self.apply(product_id, quantity, StockChangeType::Return)
    }

    pub fn entries(&self) -> &[LedgerEntryDraft] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Net change per product, sorted by product id, zero nets dropped.
    pub fn deltas(&self) -> Vec<(String, i64)> {
        let mut deltas: Vec<(String, i64)> = self
            .running
            .iter()
            .filter_map(|(id, current)| {
                let original = self.locked.get(id)?.stock;
                let delta = current - original;
                (delta != 0).then(|| (id.clone(), delta))
            })
            .collect();
        deltas.sort_by(|a, b| a.0.cmp(&b.0));
        deltas
    }
}

/// Replays a product's ledger in creation order.
///
/// ## Returns
/// The stock after the last entry, or `None` when there are no entries.
///
/// ## Errors
/// `LedgerBroken` when an entry's arithmetic is off, when an entry does not
/// start where the previous one ended, or when it belongs to another product.
pub fn replay(product_id: &str, entries: &[StockHistory]) -> CoreResult<Option<i64>> {
    let broken = |reason: String| CoreError::LedgerBroken {
        product_id: product_id.to_string(),
        reason,
    };

    let mut last: Option<i64> = None;
    for entry in entries {
        if entry.product_id != product_id {
            return Err(broken(format!(
                "entry {} belongs to product {}",
                entry.id, entry.product_id
            )));
        }
        if entry.previous_stock + entry.change_amount != entry.current_stock {
            return Err(broken(format!(
                "entry {}: {} + {} != {}",
                entry.id, entry.previous_stock, entry.change_amount, entry.current_stock
            )));
        }
        if let Some(expected) = last {
            if entry.previous_stock != expected {
                return Err(broken(format!(
                    "entry {} starts at {} but the previous entry ended at {}",
                    entry.id, entry.previous_stock, expected
                )));
            }
        }
        last = Some(entry.current_stock);
    }
    Ok(last)
}
