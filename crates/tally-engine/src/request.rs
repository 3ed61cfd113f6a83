//! Inputs and outputs of [`crate::OrderService`] operations.

use serde::{Deserialize, Serialize};
use tally_core::validation::{
    validate_line_count, validate_quantity, validate_reference, validate_unique_ids,
};
use tally_core::{OrderStatus, OrderType, ValidationError};

/// One requested line: a product, a quantity, and the options picked for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub option_ids: Vec<String>,
}

impl OrderLineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLineRequest {
            product_id: product_id.into(),
            quantity,
            option_ids: Vec::new(),
        }
    }

    pub fn with_option(mut self, option_id: impl Into<String>) -> Self {
        self.option_ids.push(option_id.into());
        self
    }
}

/// Checks a line list before any unit of work is opened.
///
/// ## Rules
/// - 1 to `MAX_ORDER_LINES` lines
/// - every quantity within `1..=MAX_ITEM_QUANTITY`
/// - each product at most once, each option at most once per line
pub fn validate_lines(lines: &[OrderLineRequest]) -> Result<(), ValidationError> {
    validate_line_count(lines.len())?;

    for line in lines {
        validate_reference("product_id", &line.product_id)?;
        validate_quantity(line.quantity)?;
        for option_id in &line.option_ids {
            validate_reference("option_id", option_id)?;
        }
        validate_unique_ids("option_id", line.option_ids.iter().map(String::as_str))?;
    }

    validate_unique_ids("product_id", lines.iter().map(|l| l.product_id.as_str()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The full desired line list; lines not listed are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemsRequest {
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPaymentRequest {
    pub payment_method_id: String,
    /// Minor units tendered. `None` or `0` means "exact amount".
    #[serde(default)]
    pub cash_received: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default)]
    pub per_page: Option<i64>,
}

fn first_page() -> i64 {
    1
}

impl Default for ListOrdersQuery {
    fn default() -> Self {
        ListOrdersQuery {
            status: None,
            order_type: None,
            user_id: None,
            page: first_page(),
            per_page: None,
        }
    }
}

/// What a gateway notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// The order moved to this status.
    Applied(OrderStatus),
    /// The order was already paid or cancelled; nothing changed.
    AlreadyFinal(OrderStatus),
    /// Intermediate gateway status; nothing changed.
    Ignored,
}

/// Live stock next to the stock the ledger replays to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAudit {
    pub product_id: String,
    pub live_stock: i64,
    /// `None` when the product has no ledger entries yet.
    pub ledger_stock: Option<i64>,
}

impl StockAudit {
    pub fn is_consistent(&self) -> bool {
        self.ledger_stock.map_or(true, |s| s == self.live_stock)
    }
}
