//! # Order Service
//!
//! Entry points of the order transaction engine. Every mutation runs in one
//! unit of work and returns the order-with-items detail read after commit.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request            (no I/O, InvalidInput)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.begin() ─────────────────────────────────────────────────────────┐ │
//! │  │  lock order header / product rows                                 │ │
//! │  │  plan stock movements        (InsufficientStock before writes)    │ │
//! │  │  write items, totals, stock deltas, ledger rows                   │ │
//! │  │  any error: unit dropped → rolled back                            │ │
//! │  └── commit ─────────────────────────────────────────────────────────┘ │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get_order()  ──►  audit.emit()  (queued, never awaited)  ──► caller   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Actor
//! Mutations take `Option<ActorId>`. An absent actor is logged and the
//! operation proceeds with a null owner / ledger actor.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tally_core::ledger::replay;
use tally_core::pricing::{price_line, OrderTotals};
use tally_core::settlement::{map_gateway_status, settle_manual};
use tally_core::status::{check_order_transition, ensure_cancellable, ensure_editable, is_gateway_final};
use tally_core::validation::{
    validate_cash_received, validate_note, validate_page, validate_reference, validate_uuid,
};
use tally_core::{
    ActorId, Money, Order, OrderDetail, OrderItem, OrderItemOption, OrderStatus, PaginatedOrders,
    ProductOption, StockHistory,
};
use tally_db::repository::order::generate_order_id;
use tally_db::{Database, ItemQuantityUpdate, OrderFilter, UnitOfWork};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{ActivityLogger, AuditAction, AuditDispatcher, AuditEvent};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{ChargeResponse, GatewayError, GatewayNotification, PaymentGateway};
use crate::promotion::evaluate_for_order;
use crate::request::{
    validate_lines, CancelOrderRequest, CreateOrderRequest, ListOrdersQuery, ManualPaymentRequest,
    NotificationOutcome, OrderLineRequest, StockAudit, UpdateItemsRequest,
};
use crate::stock::{self, LockedProducts};

#[cfg(test)]
mod tests;

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const MAX_HISTORY_LIMIT: i64 = 1000;

/// Runtime knobs the service reads on every call.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub gateway_timeout: Duration,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ServiceSettings {
    fn from(config: &EngineConfig) -> Self {
        ServiceSettings {
            gateway_timeout: config.gateway_timeout(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// The order transaction engine.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    audit: AuditDispatcher,
    settings: ServiceSettings,
}

impl OrderService {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        audit: AuditDispatcher,
        settings: ServiceSettings,
    ) -> Self {
        OrderService {
            db,
            gateway,
            audit,
            settings,
        }
    }

    /// Opens the database, starts the audit worker, and builds the service.
    pub async fn start(
        config: &EngineConfig,
        gateway: Arc<dyn PaymentGateway>,
        logger: Arc<dyn ActivityLogger>,
    ) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let (audit, _worker) =
            AuditDispatcher::spawn(logger, config.audit_buffer_size, config.audit_timeout());

        info!(path = %config.database_path.display(), "Order service started");
        Ok(OrderService::new(db, gateway, audit, ServiceSettings::from(config)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Create / Update Items
    // =========================================================================

    /// Creates an order, takes its stock, and records one sale per product.
    pub async fn create_order(
        &self,
        actor: Option<ActorId>,
        request: CreateOrderRequest,
    ) -> EngineResult<OrderDetail> {
        validate_lines(&request.items)?;
        let notes = validate_note("notes", request.notes.as_deref())?;
        warn_if_anonymous(actor.as_ref(), "create_order");

        let order_id = generate_order_id();
        let now = Utc::now();

        let mut uow = self.db.begin().await?;

        uow.orders()
            .insert(&Order {
                id: order_id.clone(),
                user_id: actor.as_ref().map(|a| a.as_str().to_string()),
                order_type: request.order_type,
                status: OrderStatus::Open,
                gross_total: 0,
                discount_amount: 0,
                net_total: 0,
                applied_promotion_id: None,
                payment_method_id: None,
                payment_gateway_reference: None,
                cash_received: None,
                change_due: None,
                cancellation_reason: None,
                notes,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let mut locked = stock::lock(
            &mut uow,
            request.items.iter().map(|line| line.product_id.as_str()),
        )
        .await?;

        let lines: Vec<&OrderLineRequest> = request.items.iter().collect();
        let (items, options) = build_lines(&mut uow, &order_id, &lines, &mut locked, now).await?;

        uow.orders().insert_items(&items).await?;
        uow.orders().insert_item_options(&options).await?;
        stock::persist(&mut uow, locked.plan(), &order_id, actor.as_ref(), None).await?;

        let totals = OrderTotals::from_subtotals(items.iter().map(OrderItem::subtotal))?;
        write_totals(&mut uow, &order_id, totals, None).await?;

        uow.commit().await?;

        info!(
            order_id = %order_id,
            lines = items.len(),
            gross_total = totals.gross.minor_units(),
            "Order created"
        );

        let detail = self.get_order(&order_id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::Create,
            &order_id,
            json!({ "status": detail.order.status, "gross_total": detail.order.gross_total }),
        ));
        Ok(detail)
    }

    /// Replaces the order's lines with `request.items`.
    ///
    /// Existing lines keep their frozen price and options; only their
    /// quantity changes. Options in the request apply to new lines only.
    /// Totals are recomputed and any applied promotion is cleared.
    pub async fn update_items(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
        request: UpdateItemsRequest,
    ) -> EngineResult<OrderDetail> {
        validate_reference("order_id", order_id)?;
        validate_lines(&request.items)?;
        warn_if_anonymous(actor.as_ref(), "update_items");

        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let order = lock_order(&mut uow, order_id).await?;
        ensure_editable(&order)?;

        let existing = uow.orders().items(&order.id).await?;
        let mut locked = stock::lock(
            &mut uow,
            existing
                .iter()
                .map(|item| item.product_id.as_str())
                .chain(request.items.iter().map(|line| line.product_id.as_str())),
        )
        .await?;

        let by_product: HashMap<&str, &OrderItem> = existing
            .iter()
            .map(|item| (item.product_id.as_str(), item))
            .collect();
        let requested: HashSet<&str> = request
            .items
            .iter()
            .map(|line| line.product_id.as_str())
            .collect();

        let mut updates = Vec::new();
        let mut subtotals = Vec::new();
        let mut new_lines = Vec::new();

        for line in &request.items {
            let Some(item) = by_product.get(line.product_id.as_str()) else {
                new_lines.push(line);
                continue;
            };

            let diff = line.quantity - item.quantity;
            if diff > 0 {
                locked.plan_mut().sell(&item.product_id, diff)?;
            } else if diff < 0 {
                locked.plan_mut().restore(&item.product_id, -diff)?;
            }

            let subtotal = item.price_at_sale().multiply_quantity(line.quantity)?;
            if diff != 0 {
                updates.push(ItemQuantityUpdate {
                    item_id: item.id.clone(),
                    quantity: line.quantity,
                    subtotal: subtotal.minor_units(),
                });
            }
            subtotals.push(subtotal);
        }

        let mut removed = Vec::new();
        for item in &existing {
            if !requested.contains(item.product_id.as_str()) {
                locked.plan_mut().restore(&item.product_id, item.quantity)?;
                removed.push(item.id.clone());
            }
        }

        let (new_items, new_options) =
            build_lines(&mut uow, &order.id, &new_lines, &mut locked, now).await?;
        subtotals.extend(new_items.iter().map(OrderItem::subtotal));

        uow.orders().update_item_quantities(&updates).await?;
        uow.orders().delete_items(&removed).await?;
        uow.orders().insert_items(&new_items).await?;
        uow.orders().insert_item_options(&new_options).await?;
        stock::persist(&mut uow, locked.plan(), &order.id, actor.as_ref(), None).await?;

        if let Some(promotion_id) = &order.applied_promotion_id {
            info!(order_id = %order.id, promotion_id = %promotion_id, "Items changed, promotion cleared");
        }
        let totals = OrderTotals::from_subtotals(subtotals)?;
        write_totals(&mut uow, &order.id, totals, None).await?;

        uow.commit().await?;

        info!(
            order_id = %order.id,
            changed = updates.len(),
            removed = removed.len(),
            added = new_items.len(),
            gross_total = totals.gross.minor_units(),
            "Order items updated"
        );

        let detail = self.get_order(&order.id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::UpdateItems,
            &order.id,
            json!({
                "changed": updates.len(),
                "removed": removed.len(),
                "added": new_items.len(),
                "gross_total": detail.order.gross_total,
            }),
        ));
        Ok(detail)
    }

    // =========================================================================
    // Cancel / Status
    // =========================================================================

    /// Cancels an open order and returns its stock.
    ///
    /// With an outstanding gateway transaction, the gateway cancel must
    /// succeed first; otherwise nothing changes locally.
    pub async fn cancel_order(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
        request: CancelOrderRequest,
    ) -> EngineResult<OrderDetail> {
        validate_reference("order_id", order_id)?;
        let reason = validate_note("reason", request.reason.as_deref())?;
        let notes = validate_note("notes", request.notes.as_deref())?;
        warn_if_anonymous(actor.as_ref(), "cancel_order");

        let mut uow = self.db.begin().await?;

        let order = lock_order(&mut uow, order_id).await?;
        ensure_cancellable(&order.id, order.status)?;

        let restored = self
            .cancel_locked(&mut uow, &order, reason.as_deref(), notes.as_deref(), actor.as_ref())
            .await?;

        uow.commit().await?;

        info!(order_id = %order.id, restored_lines = restored, "Order cancelled");

        let detail = self.get_order(&order.id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::Cancel,
            &order.id,
            json!({ "reason": reason, "restored_lines": restored }),
        ));
        Ok(detail)
    }

    /// Moves the order along the operational status table.
    ///
    /// Moving to `cancelled` runs the same routine as [`Self::cancel_order`].
    pub async fn update_status(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
        status: OrderStatus,
    ) -> EngineResult<OrderDetail> {
        validate_reference("order_id", order_id)?;
        warn_if_anonymous(actor.as_ref(), "update_status");

        let mut uow = self.db.begin().await?;

        let order = lock_order(&mut uow, order_id).await?;
        check_order_transition(&order, status)?;

        if status == OrderStatus::Cancelled {
            self.cancel_locked(&mut uow, &order, None, None, actor.as_ref())
                .await?;
        } else {
            uow.orders().update_status(&order.id, status).await?;
        }

        uow.commit().await?;

        info!(order_id = %order.id, from = %order.status, to = %status, "Order status updated");

        let detail = self.get_order(&order.id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::UpdateStatus,
            &order.id,
            json!({ "from": order.status, "to": status }),
        ));
        Ok(detail)
    }

    /// Gateway cancel (if needed), status write, stock return.
    async fn cancel_locked(
        &self,
        uow: &mut UnitOfWork,
        order: &Order,
        reason: Option<&str>,
        notes: Option<&str>,
        actor: Option<&ActorId>,
    ) -> EngineResult<usize> {
        if let Some(reference) = &order.payment_gateway_reference {
            debug!(order_id = %order.id, reference = %reference, "Cancelling gateway transaction");
            self.call_gateway(self.gateway.cancel(&order.id)).await?;
        }

        uow.orders().mark_cancelled(&order.id, reason, notes).await?;
        restore_lines(uow, &order.id, actor, reason).await
    }

    // =========================================================================
    // Promotions
    // =========================================================================

    /// Applies a promotion, replacing any earlier one.
    pub async fn apply_promotion(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
        promotion_id: &str,
    ) -> EngineResult<OrderDetail> {
        validate_reference("order_id", order_id)?;
        validate_reference("promotion_id", promotion_id)?;
        warn_if_anonymous(actor.as_ref(), "apply_promotion");

        let mut uow = self.db.begin().await?;

        let order = lock_order(&mut uow, order_id).await?;
        ensure_editable(&order)?;

        let evaluation = evaluate_for_order(&mut uow, &order, promotion_id).await?;
        let totals = OrderTotals::with_discount(order.gross_total(), evaluation.discount);
        write_totals(&mut uow, &order.id, totals, Some(promotion_id)).await?;

        uow.commit().await?;

        info!(
            order_id = %order.id,
            promotion_id = %promotion_id,
            discount = totals.discount.minor_units(),
            net_total = totals.net.minor_units(),
            "Promotion applied"
        );

        let detail = self.get_order(&order.id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::ApplyPromotion,
            &order.id,
            json!({
                "promotion_id": promotion_id,
                "discount_amount": totals.discount.minor_units(),
                "skipped_rules": evaluation.skipped_rules,
            }),
        ));
        Ok(detail)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a cash or card payment taken at the counter.
    ///
    /// Settlement does not change the operational status.
    pub async fn confirm_manual_payment(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
        request: ManualPaymentRequest,
    ) -> EngineResult<OrderDetail> {
        validate_reference("order_id", order_id)?;
        validate_reference("payment_method_id", &request.payment_method_id)?;
        validate_cash_received(request.cash_received)?;
        warn_if_anonymous(actor.as_ref(), "confirm_manual_payment");

        let mut uow = self.db.begin().await?;

        let order = lock_order(&mut uow, order_id).await?;
        ensure_payable(&order)?;

        let method = uow
            .payment_methods()
            .get_by_id(&request.payment_method_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Payment method", &request.payment_method_id))?;
        if !method.is_active {
            return Err(EngineError::invalid_input(format!(
                "payment method '{}' is not active",
                method.id
            )));
        }

        let settlement = settle_manual(
            order.net_total(),
            method.is_cash,
            request.cash_received.map(Money::from_minor),
        )?;

        uow.orders()
            .record_manual_payment(
                &order.id,
                &method.id,
                settlement.cash_received.minor_units(),
                settlement.change_due.minor_units(),
            )
            .await?;

        uow.commit().await?;

        info!(
            order_id = %order.id,
            payment_method = %method.id,
            cash_received = settlement.cash_received.minor_units(),
            change_due = settlement.change_due.minor_units(),
            "Manual payment recorded"
        );

        let detail = self.get_order(&order.id).await?;
        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::Payment,
            &order.id,
            json!({
                "payment_method_id": method.id,
                "cash_received": settlement.cash_received.minor_units(),
                "change_due": settlement.change_due.minor_units(),
            }),
        ));
        Ok(detail)
    }

    /// Asks the gateway for a charge of the order's net total and stores
    /// the transaction id as the order's gateway reference.
    ///
    /// The gateway call happens outside any unit of work. An order with a
    /// charge still awaiting its final notification is refused; cancel the
    /// order to void that charge.
    pub async fn initiate_gateway_payment(
        &self,
        actor: Option<ActorId>,
        order_id: &str,
    ) -> EngineResult<ChargeResponse> {
        validate_reference("order_id", order_id)?;
        warn_if_anonymous(actor.as_ref(), "initiate_gateway_payment");

        let order = {
            let mut session = self.db.session().await?;
            session
                .orders()
                .get_by_id(order_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Order", order_id))?
        };
        ensure_payable(&order)?;
        ensure_no_pending_charge(&order)?;

        let charge = self
            .call_gateway(self.gateway.create_charge(&order.id, order.net_total()))
            .await?;

        let mut uow = self.db.begin().await?;
        let current = lock_order(&mut uow, &order.id).await?;
        if let Err(e) = ensure_payable(&current).and_then(|()| ensure_no_pending_charge(&current)) {
            drop(uow);
            if current.has_pending_charge() || current.is_gateway_settled() {
                // Gateway cancels are keyed by order id, so voiding now would
                // hit the charge the order already records.
                warn!(
                    order_id = %order.id,
                    transaction_id = %charge.transaction_id,
                    "Order took another gateway charge meanwhile, leaving it in place"
                );
                return Err(e);
            }
            warn!(
                order_id = %order.id,
                transaction_id = %charge.transaction_id,
                "Order changed while the charge was created, voiding charge"
            );
            if let Err(cancel_err) = self.call_gateway(self.gateway.cancel(&order.id)).await {
                error!(order_id = %order.id, error = %cancel_err, "Failed to void orphaned charge");
            }
            return Err(e);
        }
        uow.orders()
            .set_gateway_reference(&order.id, &charge.transaction_id)
            .await?;
        uow.commit().await?;

        info!(
            order_id = %order.id,
            transaction_id = %charge.transaction_id,
            amount = order.net_total,
            "Gateway payment initiated"
        );

        self.audit.emit(AuditEvent::order(
            actor,
            AuditAction::PaymentInitiated,
            &order.id,
            json!({ "transaction_id": charge.transaction_id, "amount": order.net_total }),
        ));
        Ok(charge)
    }

    /// Reconciles a gateway notification.
    ///
    /// Redelivered notifications for paid or cancelled orders succeed without
    /// changing anything. Intermediate statuses are ignored.
    pub async fn handle_gateway_notification(
        &self,
        notification: GatewayNotification,
    ) -> EngineResult<NotificationOutcome> {
        if !self.gateway.verify_signature(&notification) {
            error!(
                order_id = %notification.order_id,
                transaction_id = %notification.transaction_id,
                "Gateway notification signature rejected"
            );
            return Err(EngineError::SignatureInvalid);
        }

        if validate_uuid("order_id", &notification.order_id).is_err() {
            return Err(EngineError::not_found("Order", &notification.order_id));
        }

        let mut uow = self.db.begin().await?;
        let order = lock_order(&mut uow, &notification.order_id).await?;

        if is_gateway_final(order.status) {
            info!(
                order_id = %order.id,
                status = %order.status,
                transaction_status = %notification.transaction_status,
                "Order already final, notification ignored"
            );
            return Ok(NotificationOutcome::AlreadyFinal(order.status));
        }

        let Some(target) = map_gateway_status(&notification.transaction_status) else {
            info!(
                order_id = %order.id,
                transaction_status = %notification.transaction_status,
                "Intermediate gateway status, nothing to do"
            );
            return Ok(NotificationOutcome::Ignored);
        };

        if order.payment_gateway_reference.as_deref() != Some(notification.transaction_id.as_str()) {
            return Err(EngineError::not_found(
                "Order with gateway reference",
                &notification.transaction_id,
            ));
        }

        let owner = order.user_id.clone().map(ActorId::new);

        uow.orders()
            .update_status_by_gateway_reference(&notification.transaction_id, target)
            .await?;
        if target == OrderStatus::Cancelled {
            restore_lines(&mut uow, &order.id, owner.as_ref(), Some("gateway cancellation")).await?;
        }

        uow.commit().await?;

        info!(
            order_id = %order.id,
            transaction_id = %notification.transaction_id,
            status = %target,
            "Gateway notification applied"
        );

        self.audit.emit(AuditEvent::order(
            owner,
            AuditAction::GatewayNotification,
            &order.id,
            json!({
                "transaction_id": notification.transaction_id,
                "transaction_status": notification.transaction_status,
                "status": target,
            }),
        ));
        Ok(NotificationOutcome::Applied(target))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order(&self, order_id: &str) -> EngineResult<OrderDetail> {
        let mut session = self.db.session().await?;

        let order = session
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;
        let items = session.orders().item_details(order_id).await?;

        Ok(OrderDetail { order, items })
    }

    /// One page of orders, newest first, with the total count.
    pub async fn list_orders(&self, query: ListOrdersQuery) -> EngineResult<PaginatedOrders> {
        let (page, per_page) = validate_page(
            query.page,
            query.per_page,
            self.settings.default_page_size,
            self.settings.max_page_size,
        )?;

        let filter = OrderFilter {
            status: query.status,
            order_type: query.order_type,
            user_id: query.user_id,
        };
        let listing = self.db.order_listing();
        let offset = (page - 1) * per_page;

        let (data, total) = tokio::try_join!(
            listing.list(&filter, per_page, offset),
            listing.count(&filter)
        )?;

        Ok(PaginatedOrders {
            data,
            total,
            page,
            per_page,
        })
    }

    /// Ledger entries for a product, oldest first.
    pub async fn stock_history(
        &self,
        product_id: &str,
        limit: Option<i64>,
    ) -> EngineResult<Vec<StockHistory>> {
        validate_reference("product_id", product_id)?;
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let mut session = self.db.session().await?;
        Ok(session.stock_history().for_product(product_id, limit).await?)
    }

    /// Replays a product's whole ledger and compares it with live stock.
    pub async fn audit_stock(&self, product_id: &str) -> EngineResult<StockAudit> {
        validate_reference("product_id", product_id)?;

        let mut session = self.db.session().await?;
        let product = session
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;
        let entries = session
            .stock_history()
            .for_product(product_id, i64::MAX)
            .await?;

        let audit = StockAudit {
            product_id: product.id,
            live_stock: product.stock,
            ledger_stock: replay(product_id, &entries)?,
        };
        if !audit.is_consistent() {
            error!(
                product_id = %product_id,
                live = audit.live_stock,
                ledger = ?audit.ledger_stock,
                "Stock does not match its ledger"
            );
        }
        Ok(audit)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn call_gateway<T, F>(&self, call: F) -> EngineResult<T>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.settings.gateway_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GatewayError::Timeout(self.settings.gateway_timeout.as_millis() as u64).into()),
        }
    }
}

fn warn_if_anonymous(actor: Option<&ActorId>, operation: &'static str) {
    if actor.is_none() {
        warn!(operation, "No actor supplied, proceeding without one");
    }
}

fn ensure_payable(order: &Order) -> EngineResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(EngineError::PaymentFailed(format!(
            "order {} is cancelled",
            order.id
        )));
    }
    if order.is_settled() {
        return Err(EngineError::AlreadyPaid {
            order_id: order.id.clone(),
        });
    }
    Ok(())
}

fn ensure_no_pending_charge(order: &Order) -> EngineResult<()> {
    match &order.payment_gateway_reference {
        Some(reference) if order.has_pending_charge() => Err(EngineError::PaymentFailed(format!(
            "order {} already has gateway charge {} awaiting settlement",
            order.id, reference
        ))),
        _ => Ok(()),
    }
}

async fn lock_order(uow: &mut UnitOfWork, order_id: &str) -> EngineResult<Order> {
    uow.orders()
        .lock(order_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Order", order_id))
}

async fn write_totals(
    uow: &mut UnitOfWork,
    order_id: &str,
    totals: OrderTotals,
    promotion_id: Option<&str>,
) -> EngineResult<()> {
    uow.orders()
        .update_totals(
            order_id,
            totals.gross.minor_units(),
            totals.discount.minor_units(),
            totals.net.minor_units(),
            promotion_id,
        )
        .await?;
    Ok(())
}

/// Prices new lines, snapshots their options and plans their sales.
///
/// Options are fetched in one batch and must belong to their line's product.
async fn build_lines(
    uow: &mut UnitOfWork,
    order_id: &str,
    lines: &[&OrderLineRequest],
    locked: &mut LockedProducts,
    now: DateTime<Utc>,
) -> EngineResult<(Vec<OrderItem>, Vec<OrderItemOption>)> {
    if lines.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let option_ids: Vec<String> = lines
        .iter()
        .flat_map(|line| line.option_ids.iter().cloned())
        .collect();
    let options: HashMap<String, ProductOption> = uow
        .products()
        .options_by_ids(&option_ids)
        .await?
        .into_iter()
        .map(|o| (o.id.clone(), o))
        .collect();

    let mut items = Vec::with_capacity(lines.len());
    let mut snapshots = Vec::new();

    for line in lines {
        let product = locked.product(&line.product_id)?;
        if !product.is_active {
            return Err(EngineError::invalid_input(format!(
                "product '{}' is not available",
                product.id
            )));
        }

        let item_id = Uuid::new_v4().to_string();
        let mut surcharges = Vec::with_capacity(line.option_ids.len());

        for option_id in &line.option_ids {
            let option = options.get(option_id).ok_or_else(|| {
                EngineError::invalid_input(format!("option '{}' does not exist", option_id))
            })?;
            if option.product_id != product.id {
                return Err(EngineError::invalid_input(format!(
                    "option '{}' does not belong to product '{}'",
                    option_id, product.id
                )));
            }
            if !option.is_active {
                return Err(EngineError::invalid_input(format!(
                    "option '{}' is not available",
                    option_id
                )));
            }

            surcharges.push(option.additional_price());
            snapshots.push(OrderItemOption {
                id: Uuid::new_v4().to_string(),
                order_item_id: item_id.clone(),
                product_option_id: option.id.clone(),
                option_name: option.name.clone(),
                price_at_sale: option.additional_price,
            });
        }

        let price = price_line(product.price(), &surcharges, line.quantity)?;
        items.push(OrderItem {
            id: item_id,
            order_id: order_id.to_string(),
            product_id: product.id.clone(),
            quantity: line.quantity,
            price_at_sale: price.unit_price.minor_units(),
            subtotal: price.subtotal.minor_units(),
            net_subtotal: price.subtotal.minor_units(),
            cost_price_at_sale: product.cost_price,
            created_at: now,
        });

        locked.plan_mut().sell(&line.product_id, line.quantity)?;
    }

    Ok((items, snapshots))
}

/// Returns every line's full quantity to stock.
async fn restore_lines(
    uow: &mut UnitOfWork,
    order_id: &str,
    actor: Option<&ActorId>,
    note: Option<&str>,
) -> EngineResult<usize> {
    let items = uow.orders().items(order_id).await?;
    if items.is_empty() {
        return Ok(0);
    }

    let mut locked = stock::lock(uow, items.iter().map(|item| item.product_id.as_str())).await?;
    for item in &items {
        locked.plan_mut().restore(&item.product_id, item.quantity)?;
    }
    stock::persist(uow, locked.plan(), order_id, actor, note).await?;

    Ok(items.len())
}
