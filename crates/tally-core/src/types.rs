//! # Domain Types
//!
//! Core domain types used throughout the Tally order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │──►│   OrderItem     │──►│ OrderItemOption │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  status         │   │  price_at_sale  │   │  price_at_sale  │       │
//! │  │  gross/net      │   │  subtotal       │   │  (snapshot)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │──►│  StockHistory   │   │   Promotion     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price, stock   │   │  prev → current │   │  rules, targets │       │
//! │  │  category_id    │   │  change_type    │   │  scope, caps    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `OrderItem.price_at_sale`, `OrderItem.cost_price_at_sale` and
//! `OrderItemOption.price_at_sale` are frozen when the line is written.
//! Later catalog price changes never touch existing orders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// Identity of the user performing a mutation.
///
/// Passed explicitly through every mutating call. It may be absent (system
/// jobs, unauthenticated kiosks); callers take `Option<ActorId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Order Type & Status
// =============================================================================

/// How the order is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Takeaway => "takeaway",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dine_in" | "dine-in" => Ok(OrderType::DineIn),
            "takeaway" | "take_away" => Ok(OrderType::Takeaway),
            other => Err(ValidationError::InvalidFormat {
                field: "order_type".to_string(),
                reason: format!("unknown order type '{}'", other),
            }),
        }
    }
}

/// Operational status of an order.
///
/// See [`crate::status`] for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Items, stock and totals may change.
    Open,
    /// Kitchen / bar is working on it.
    InProgress,
    /// Handed to the customer.
    Served,
    /// Settled.
    Paid,
    /// Voided; stock returned. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Open,
        OrderStatus::InProgress,
        OrderStatus::Served,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Served => "served",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown order status '{}'", s),
            })
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category. Referenced by `required_category` rules and
/// category promotion targets.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A product as the order engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category_id: Option<String>,
    /// Selling price in minor units.
    pub price: i64,
    /// Purchase cost in minor units (for margin reporting).
    pub cost_price: i64,
    /// Units on hand. Never negative.
    pub stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price)
    }

    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_minor(self.cost_price)
    }
}

/// A selectable add-on (size, topping, ...) bound to one product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductOption {
    pub id: String,
    /// The only product this option may be ordered with.
    pub product_id: String,
    pub name: String,
    /// Surcharge in minor units, added to the line's unit price.
    pub additional_price: i64,
    pub is_active: bool,
}

impl ProductOption {
    #[inline]
    pub fn additional_price(&self) -> Money {
        Money::from_minor(self.additional_price)
    }
}

/// A way of settling an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    /// Cash payments get change calculation and default tendered amounts.
    pub is_cash: bool,
    pub is_active: bool,
}

// =============================================================================
// Order
// =============================================================================

/// An order header.
///
/// ## Money Invariant
/// `net_total = gross_total - discount_amount`, `0 <= discount_amount <= gross_total`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Owning user; absent when the order was created without an actor.
    pub user_id: Option<String>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub gross_total: i64,
    pub discount_amount: i64,
    pub net_total: i64,
    pub applied_promotion_id: Option<String>,
    /// Set once the order is settled manually.
    pub payment_method_id: Option<String>,
    /// Transaction id issued by the payment gateway.
    pub payment_gateway_reference: Option<String>,
    pub cash_received: Option<i64>,
    pub change_due: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn gross_total(&self) -> Money {
        Money::from_minor(self.gross_total)
    }

    #[inline]
    pub fn discount_amount(&self) -> Money {
        Money::from_minor(self.discount_amount)
    }

    #[inline]
    pub fn net_total(&self) -> Money {
        Money::from_minor(self.net_total)
    }

    /// Only open orders accept item, stock, total or promotion changes.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Whether the money has been collected, at the counter or through the
    /// gateway.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.payment_method_id.is_some() || self.is_gateway_settled()
    }

    /// A `paid` order carrying a gateway reference. Gateway settlement never
    /// writes a payment method, so the pair is the only record of it.
    #[inline]
    pub fn is_gateway_settled(&self) -> bool {
        self.status == OrderStatus::Paid && self.payment_gateway_reference.is_some()
    }

    /// A gateway charge was requested and no final notification has
    /// arrived yet.
    #[inline]
    pub fn has_pending_charge(&self) -> bool {
        self.payment_gateway_reference.is_some()
            && !matches!(self.status, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Checks the money invariant.
    pub fn totals_consistent(&self) -> bool {
        self.discount_amount >= 0
            && self.discount_amount <= self.gross_total
            && self.net_total == self.gross_total - self.discount_amount
            && self.net_total >= 0
    }
}

/// A line on an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price including option surcharges (frozen).
    pub price_at_sale: i64,
    /// `price_at_sale × quantity`.
    pub subtotal: i64,
    pub net_subtotal: i64,
    /// Product cost at time of sale (frozen, for margin reporting).
    pub cost_price_at_sale: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn price_at_sale(&self) -> Money {
        Money::from_minor(self.price_at_sale)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_minor(self.subtotal)
    }
}

/// An option selected on a line, with its surcharge frozen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItemOption {
    pub id: String,
    pub order_item_id: String,
    pub product_option_id: String,
    /// Option name at time of sale (frozen).
    pub option_name: String,
    pub price_at_sale: i64,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Why a product's stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockChangeType {
    /// Units left with an order.
    Sale,
    /// Units came back (line reduced, removed or order cancelled).
    Return,
    /// Manual stock-take adjustment.
    Correction,
}

impl StockChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockChangeType::Sale => "sale",
            StockChangeType::Return => "return",
            StockChangeType::Correction => "correction",
        }
    }
}

impl fmt::Display for StockChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only ledger entry.
///
/// ## Invariant
/// `current_stock = previous_stock + change_amount`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockHistory {
    pub id: String,
    pub product_id: String,
    pub change_amount: i64,
    pub previous_stock: i64,
    pub current_stock: i64,
    pub change_type: StockChangeType,
    /// The order that caused the movement.
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub actor_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Promotions
// =============================================================================

/// Whether a promotion discounts the whole order or matching lines only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionScope {
    Order,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a whole percent.
    Percentage,
    /// `discount_value` is an amount in minor units.
    FixedAmount,
}

/// A promotion header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub scope: PromotionScope,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionRuleType {
    /// Value: minimum gross total in minor units.
    MinimumOrderAmount,
    /// Value: a product id that must be on the order.
    RequiredProduct,
    /// Value: a category id that must be on the order.
    RequiredCategory,
}

impl fmt::Display for PromotionRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromotionRuleType::MinimumOrderAmount => "minimum_order_amount",
            PromotionRuleType::RequiredProduct => "required_product",
            PromotionRuleType::RequiredCategory => "required_category",
        })
    }
}

/// One applicability rule. Rules are AND-combined.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PromotionRule {
    pub id: String,
    pub promotion_id: String,
    pub rule_type: PromotionRuleType,
    /// String-encoded rule value; parsed at evaluation time.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionTargetType {
    Product,
    Category,
}

/// A product or category an item-scope promotion discounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PromotionTarget {
    pub id: String,
    pub promotion_id: String,
    pub target_type: PromotionTargetType,
    pub target_id: String,
}

// =============================================================================
// Projections
// =============================================================================

/// A line with its product name and option snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemDetail {
    pub item: OrderItem,
    pub product_name: String,
    pub options: Vec<OrderItemOption>,
}

/// The order-with-items projection returned by every mutating operation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
}

/// One page of orders plus the total count matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaginatedOrders {
    pub data: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
    }

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("archived".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_type_accepts_aliases() {
        assert_eq!("dine-in".parse::<OrderType>().unwrap(), OrderType::DineIn);
        assert_eq!("TAKEAWAY".parse::<OrderType>().unwrap(), OrderType::Takeaway);
        assert!("delivery".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_totals_consistent() {
        let now = Utc::now();
        let mut order = Order {
            id: "o-1".to_string(),
            user_id: None,
            order_type: OrderType::DineIn,
            status: OrderStatus::Open,
            gross_total: 20000,
            discount_amount: 2000,
            net_total: 18000,
            applied_promotion_id: None,
            payment_method_id: None,
            payment_gateway_reference: None,
            cash_received: None,
            change_due: None,
            cancellation_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert!(order.totals_consistent());

        order.discount_amount = 25000;
        order.net_total = -5000;
        assert!(!order.totals_consistent());
    }

    #[test]
    fn test_settlement_predicates() {
        let now = Utc::now();
        let mut order = Order {
            id: "o-1".to_string(),
            user_id: None,
            order_type: OrderType::Takeaway,
            status: OrderStatus::Open,
            gross_total: 10000,
            discount_amount: 0,
            net_total: 10000,
            applied_promotion_id: None,
            payment_method_id: None,
            payment_gateway_reference: None,
            cash_received: None,
            change_due: None,
            cancellation_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert!(!order.is_settled());
        assert!(!order.has_pending_charge());

        order.payment_gateway_reference = Some("tx-1".to_string());
        assert!(order.has_pending_charge());
        assert!(!order.is_settled());

        order.status = OrderStatus::Paid;
        assert!(order.is_gateway_settled());
        assert!(order.is_settled());
        assert!(!order.has_pending_charge());

        order.status = OrderStatus::Served;
        order.payment_gateway_reference = None;
        order.payment_method_id = Some("cash".to_string());
        assert!(order.is_settled());
        assert!(!order.is_gateway_settled());
    }
}
