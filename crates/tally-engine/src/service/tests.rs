use super::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tally_core::promotion::PromotionDefinition;
use tally_core::{
    Category, DiscountType, OrderType, PaymentMethod, Product, Promotion, PromotionRule,
    PromotionRuleType, PromotionScope, PromotionTarget, PromotionTargetType, StockChangeType,
};
use tally_db::DbConfig;

use crate::error::ErrorCode;
use crate::gateway::ChargeAction;

const ESPRESSO: &str = "p-espresso";
const CROISSANT: &str = "p-croissant";
const TEA: &str = "p-tea";
const RETIRED: &str = "p-retired";

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeGateway {
    calls: Mutex<Vec<String>>,
    fail_cancel: AtomicBool,
    hang_cancel: AtomicBool,
    reject_signatures: AtomicBool,
}

impl FakeGateway {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_charge(&self, order_id: &str, amount: Money) -> Result<ChargeResponse, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("charge:{}:{}", order_id, amount.minor_units()));
        Ok(ChargeResponse {
            transaction_id: format!("tx-{}", order_id),
            actions: vec![ChargeAction {
                name: "generate-qr-code".to_string(),
                method: "GET".to_string(),
                url: format!("https://pay.example/qr/{}", order_id),
            }],
            expiry: None,
        })
    }

    async fn cancel(&self, order_id: &str) -> Result<(), GatewayError> {
        if self.hang_cancel.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.calls.lock().unwrap().push(format!("cancel:{}", order_id));
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    fn verify_signature(&self, _notification: &GatewayNotification) -> bool {
        !self.reject_signatures.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RecordingLogger {
    events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl ActivityLogger for RecordingLogger {
    async fn log(&self, event: &AuditEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    service: OrderService,
    gateway: Arc<FakeGateway>,
    logger: Arc<RecordingLogger>,
}

fn cashier() -> Option<ActorId> {
    Some(ActorId::new("cashier-1"))
}

fn product(id: &str, name: &str, category: &str, price: i64, stock: i64, active: bool) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        name: name.to_string(),
        category_id: Some(category.to_string()),
        price,
        cost_price: price / 3,
        stock,
        is_active: active,
        created_at: now,
        updated_at: now,
    }
}

fn option(id: &str, product_id: &str, name: &str, price: i64, active: bool) -> ProductOption {
    ProductOption {
        id: id.to_string(),
        product_id: product_id.to_string(),
        name: name.to_string(),
        additional_price: price,
        is_active: active,
    }
}

async fn seed(db: &Database) {
    let mut uow = db.begin().await.unwrap();

    for (id, name) in [("coffee", "Coffee"), ("pastry", "Pastry"), ("tea", "Tea")] {
        uow.products()
            .insert_category(&Category {
                id: id.to_string(),
                name: name.to_string(),
            })
            .await
            .unwrap();
    }

    for p in [
        product(ESPRESSO, "Espresso", "coffee", 10000, 10, true),
        product(CROISSANT, "Croissant", "pastry", 5000, 5, true),
        product(TEA, "Jasmine Tea", "tea", 3000, 20, true),
        product(RETIRED, "Old Blend", "coffee", 4000, 10, false),
    ] {
        uow.products().insert(&p).await.unwrap();
    }

    for o in [
        option("opt-large", ESPRESSO, "Large", 2000, true),
        option("opt-retired", ESPRESSO, "Syrup", 500, false),
        option("opt-warm", CROISSANT, "Warmed", 0, true),
    ] {
        uow.products().insert_option(&o).await.unwrap();
    }

    for (id, name, is_cash, is_active) in [
        ("cash", "Cash", true, true),
        ("card", "Card", false, true),
        ("voucher", "Voucher", false, false),
    ] {
        uow.payment_methods()
            .insert(&PaymentMethod {
                id: id.to_string(),
                name: name.to_string(),
                is_cash,
                is_active,
            })
            .await
            .unwrap();
    }

    uow.commit().await.unwrap();
}

async fn harness() -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(&db).await;

    let gateway = Arc::new(FakeGateway::default());
    let logger = Arc::new(RecordingLogger::default());
    let (audit, _worker) = AuditDispatcher::spawn(logger.clone(), 64, Duration::from_secs(1));

    let settings = ServiceSettings {
        gateway_timeout: Duration::from_millis(200),
        default_page_size: 2,
        max_page_size: 3,
    };
    let service = OrderService::new(db, gateway.clone(), audit, settings);

    Harness {
        service,
        gateway,
        logger,
    }
}

impl Harness {
    async fn create(&self, items: Vec<OrderLineRequest>) -> EngineResult<OrderDetail> {
        self.service
            .create_order(
                cashier(),
                CreateOrderRequest {
                    order_type: OrderType::DineIn,
                    items,
                    notes: None,
                },
            )
            .await
    }

    async fn stock(&self, product_id: &str) -> i64 {
        let mut session = self.service.database().session().await.unwrap();
        session
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn ledger(&self, product_id: &str) -> Vec<StockHistory> {
        self.service.stock_history(product_id, None).await.unwrap()
    }

    async fn order_count(&self) -> i64 {
        self.service
            .list_orders(ListOrdersQuery::default())
            .await
            .unwrap()
            .total
    }

    async fn add_promotion(&self, definition: PromotionDefinition) {
        let mut uow = self.service.database().begin().await.unwrap();
        uow.promotions().insert(&definition).await.unwrap();
        uow.commit().await.unwrap();
    }

    /// Waits for the audit worker to deliver `n` events.
    async fn audit_events(&self, n: usize) -> Vec<AuditEvent> {
        for _ in 0..200 {
            {
                let events = self.logger.events.lock().unwrap();
                if events.len() >= n {
                    return events.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} audit events", n);
    }

    async fn pay_by_gateway(&self, order_id: &str, transaction_status: &str) -> EngineResult<NotificationOutcome> {
        self.service
            .handle_gateway_notification(GatewayNotification {
                order_id: order_id.to_string(),
                transaction_id: format!("tx-{}", order_id),
                transaction_status: transaction_status.to_string(),
                gross_amount: "20000.00".to_string(),
                status_code: "200".to_string(),
                signature_key: "signed".to_string(),
            })
            .await
    }
}

fn promotion(
    id: &str,
    scope: PromotionScope,
    discount_type: DiscountType,
    value: i64,
    cap: Option<i64>,
) -> Promotion {
    let now = Utc::now();
    Promotion {
        id: id.to_string(),
        name: format!("Promotion {}", id),
        scope,
        discount_type,
        discount_value: value,
        max_discount_amount: cap,
        start_date: now - chrono::Duration::days(1),
        end_date: now + chrono::Duration::days(1),
        is_active: true,
    }
}

fn definition(promotion: Promotion) -> PromotionDefinition {
    PromotionDefinition {
        promotion,
        rules: Vec::new(),
        targets: Vec::new(),
    }
}

fn rule(promotion_id: &str, rule_type: PromotionRuleType, value: &str) -> PromotionRule {
    PromotionRule {
        id: Uuid::new_v4().to_string(),
        promotion_id: promotion_id.to_string(),
        rule_type,
        value: value.to_string(),
    }
}

async fn ten_percent(h: &Harness) {
    h.add_promotion(definition(promotion(
        "promo-10",
        PromotionScope::Order,
        DiscountType::Percentage,
        10,
        None,
    )))
    .await;
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_order_takes_stock_and_records_sale() {
    let h = harness().await;

    let detail = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap();

    assert_eq!(detail.order.status, OrderStatus::Open);
    assert_eq!(detail.order.gross_total, 20000);
    assert_eq!(detail.order.net_total, 20000);
    assert_eq!(detail.order.discount_amount, 0);
    assert_eq!(detail.order.user_id.as_deref(), Some("cashier-1"));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].product_name, "Espresso");
    assert_eq!(detail.items[0].item.cost_price_at_sale, 3333);

    assert_eq!(h.stock(ESPRESSO).await, 8);

    let ledger = h.ledger(ESPRESSO).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].change_amount, -2);
    assert_eq!(ledger[0].previous_stock, 10);
    assert_eq!(ledger[0].current_stock, 8);
    assert_eq!(ledger[0].change_type, StockChangeType::Sale);
    assert_eq!(ledger[0].reference_id.as_deref(), Some(detail.order.id.as_str()));
    assert_eq!(ledger[0].actor_id.as_deref(), Some("cashier-1"));

    let events = h.audit_events(1).await;
    assert_eq!(events[0].action, AuditAction::Create);
    assert_eq!(events[0].entity_id, detail.order.id);
    assert_eq!(events[0].details["status"], "open");
}

#[tokio::test]
async fn test_create_order_prices_options() {
    let h = harness().await;

    let detail = h
        .create(vec![
            OrderLineRequest::new(ESPRESSO, 2).with_option("opt-large"),
            OrderLineRequest::new(CROISSANT, 1).with_option("opt-warm"),
        ])
        .await
        .unwrap();

    let espresso = detail
        .items
        .iter()
        .find(|i| i.item.product_id == ESPRESSO)
        .unwrap();
    assert_eq!(espresso.item.price_at_sale, 12000);
    assert_eq!(espresso.item.subtotal, 24000);
    assert_eq!(espresso.options.len(), 1);
    assert_eq!(espresso.options[0].option_name, "Large");
    assert_eq!(espresso.options[0].price_at_sale, 2000);

    assert_eq!(detail.order.gross_total, 29000);
    assert!(detail.order.totals_consistent());
}

#[tokio::test]
async fn test_create_order_rejects_option_of_another_product() {
    let h = harness().await;

    let err = h
        .create(vec![OrderLineRequest::new(CROISSANT, 1).with_option("opt-large")])
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(h.stock(CROISSANT).await, 5);
    assert_eq!(h.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_rejects_unknown_or_inactive_options() {
    let h = harness().await;

    for option_id in ["opt-missing", "opt-retired"] {
        let err = h
            .create(vec![OrderLineRequest::new(ESPRESSO, 1).with_option(option_id)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }
    assert_eq!(h.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_insufficient_stock_rolls_back_everything() {
    let h = harness().await;

    let err = h
        .create(vec![
            OrderLineRequest::new(ESPRESSO, 2),
            OrderLineRequest::new(CROISSANT, 6),
        ])
        .await
        .unwrap_err();

    match err {
        EngineError::InsufficientStock {
            product_id,
            available,
            requested,
            ..
        } => {
            assert_eq!(product_id, CROISSANT);
            assert_eq!(available, 5);
            assert_eq!(requested, 6);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(h.stock(ESPRESSO).await, 10);
    assert!(h.ledger(ESPRESSO).await.is_empty());
    assert_eq!(h.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_unknown_and_inactive_products() {
    let h = harness().await;

    let err = h.create(vec![OrderLineRequest::new("p-404", 1)]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = h.create(vec![OrderLineRequest::new(RETIRED, 1)]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(h.stock(RETIRED).await, 10);
}

#[tokio::test]
async fn test_create_order_rejects_bad_requests() {
    let h = harness().await;

    assert_eq!(h.create(vec![]).await.unwrap_err().code(), ErrorCode::InvalidInput);
    assert_eq!(
        h.create(vec![OrderLineRequest::new(ESPRESSO, 0)])
            .await
            .unwrap_err()
            .code(),
        ErrorCode::InvalidInput
    );
    assert_eq!(
        h.create(vec![
            OrderLineRequest::new(ESPRESSO, 1),
            OrderLineRequest::new(ESPRESSO, 1),
        ])
        .await
        .unwrap_err()
        .code(),
        ErrorCode::InvalidInput
    );
}

#[tokio::test]
async fn test_create_order_without_actor() {
    let h = harness().await;

    let detail = h
        .service
        .create_order(
            None,
            CreateOrderRequest {
                order_type: OrderType::Takeaway,
                items: vec![OrderLineRequest::new(TEA, 1)],
                notes: Some("  no sugar ".to_string()),
            },
        )
        .await
        .unwrap();

    assert!(detail.order.user_id.is_none());
    assert_eq!(detail.order.order_type, OrderType::Takeaway);
    assert_eq!(detail.order.notes.as_deref(), Some("no sugar"));
    assert!(h.ledger(TEA).await[0].actor_id.is_none());
}

/// A migrated, seeded file store that several connections can share.
async fn file_service(dir: &tempfile::TempDir, overrides: &str) -> (OrderService, Arc<FakeGateway>) {
    let config = EngineConfig::from_toml_str(&format!(
        "database_path = '{}'\nmax_connections = 8\n{}",
        dir.path().join("orders.db").display(),
        overrides
    ))
    .unwrap();

    let db = Database::new(config.db_config()).await.unwrap();
    seed(&db).await;

    let gateway = Arc::new(FakeGateway::default());
    let (audit, _worker) =
        AuditDispatcher::spawn(Arc::new(RecordingLogger::default()), 64, Duration::from_secs(1));
    let service = OrderService::new(db, gateway.clone(), audit, ServiceSettings::from(&config));
    (service, gateway)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_cannot_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _gateway) = file_service(&dir, "").await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_order(
                        cashier(),
                        CreateOrderRequest {
                            order_type: OrderType::DineIn,
                            items: vec![OrderLineRequest::new(CROISSANT, 1)],
                            notes: None,
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut short = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(EngineError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 5);
    assert_eq!(short, 3);

    let audit = service.audit_stock(CROISSANT).await.unwrap();
    assert_eq!(audit.live_stock, 0);
    assert_eq!(audit.ledger_stock, Some(0));
    assert!(audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_writers_wait_out_a_slow_gateway_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let (service, gateway) =
        file_service(&dir, "gateway_timeout_ms = 300\nbusy_timeout_ms = 3000").await;

    let pending = service
        .create_order(
            cashier(),
            CreateOrderRequest {
                order_type: OrderType::DineIn,
                items: vec![OrderLineRequest::new(ESPRESSO, 1)],
                notes: None,
            },
        )
        .await
        .unwrap()
        .order;
    service
        .initiate_gateway_payment(cashier(), &pending.id)
        .await
        .unwrap();
    gateway.hang_cancel.store(true, Ordering::SeqCst);

    let (cancelled, created) = tokio::join!(
        service.cancel_order(cashier(), &pending.id, CancelOrderRequest::default()),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service
                .create_order(
                    cashier(),
                    CreateOrderRequest {
                        order_type: OrderType::Takeaway,
                        items: vec![OrderLineRequest::new(TEA, 2)],
                        notes: None,
                    },
                )
                .await
        }
    );

    assert_eq!(cancelled.unwrap_err().code(), ErrorCode::GatewayError);
    let created = created.unwrap();
    assert_eq!(created.order.gross_total, 6000);

    let still_open = service.get_order(&pending.id).await.unwrap().order;
    assert_eq!(still_open.status, OrderStatus::Open);
    assert!(service.audit_stock(ESPRESSO).await.unwrap().is_consistent());
    assert!(service.audit_stock(TEA).await.unwrap().is_consistent());
}

// =============================================================================
// Update Items
// =============================================================================

#[tokio::test]
async fn test_update_items_diffs_against_existing_lines() {
    let h = harness().await;
    let order = h
        .create(vec![
            OrderLineRequest::new(ESPRESSO, 2),
            OrderLineRequest::new(CROISSANT, 1),
        ])
        .await
        .unwrap()
        .order;

    let detail = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(ESPRESSO, 3), OrderLineRequest::new(TEA, 2)],
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.order.gross_total, 36000);
    assert_eq!(detail.order.net_total, 36000);

    assert_eq!(h.stock(ESPRESSO).await, 7);
    assert_eq!(h.stock(CROISSANT).await, 5);
    assert_eq!(h.stock(TEA).await, 18);

    let espresso: Vec<i64> = h.ledger(ESPRESSO).await.iter().map(|e| e.change_amount).collect();
    assert_eq!(espresso, vec![-2, -1]);

    let croissant = h.ledger(CROISSANT).await;
    assert_eq!(croissant.len(), 2);
    assert_eq!(croissant[1].change_amount, 1);
    assert_eq!(croissant[1].change_type, StockChangeType::Return);

    let events = h.audit_events(2).await;
    assert!(events.iter().any(|e| e.action == AuditAction::UpdateItems));
}

#[tokio::test]
async fn test_update_items_lowering_quantity_returns_stock() {
    let h = harness().await;
    let order = h
        .create(vec![OrderLineRequest::new(ESPRESSO, 4).with_option("opt-large")])
        .await
        .unwrap()
        .order;

    let detail = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(ESPRESSO, 1)],
            },
        )
        .await
        .unwrap();

    // Existing line keeps its frozen unit price and option snapshot.
    assert_eq!(detail.items[0].item.price_at_sale, 12000);
    assert_eq!(detail.items[0].item.subtotal, 12000);
    assert_eq!(detail.items[0].options.len(), 1);
    assert_eq!(detail.order.gross_total, 12000);

    assert_eq!(h.stock(ESPRESSO).await, 9);
    let last = h.ledger(ESPRESSO).await.pop().unwrap();
    assert_eq!(last.change_amount, 3);
    assert_eq!(last.change_type, StockChangeType::Return);
}

#[tokio::test]
async fn test_update_items_insufficient_stock_leaves_order_untouched() {
    let h = harness().await;
    let order = h
        .create(vec![OrderLineRequest::new(CROISSANT, 2)])
        .await
        .unwrap()
        .order;

    let err = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(CROISSANT, 8)],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::InsufficientStock { available: 3, requested: 6, .. }
    ));
    assert_eq!(h.stock(CROISSANT).await, 3);
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.items[0].item.quantity, 2);
    assert_eq!(detail.order.gross_total, 10000);
}

#[tokio::test]
async fn test_update_items_clears_promotion() {
    let h = harness().await;
    ten_percent(&h).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap();

    let detail = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(ESPRESSO, 2)],
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.discount_amount, 0);
    assert_eq!(detail.order.net_total, 20000);
    assert!(detail.order.applied_promotion_id.is_none());
}

#[tokio::test]
async fn test_update_items_requires_open_order() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .update_status(cashier(), &order.id, OrderStatus::InProgress)
        .await
        .unwrap();

    let err = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(ESPRESSO, 2)],
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::OrderNotModifiable);
    assert_eq!(h.stock(ESPRESSO).await, 9);
}

// =============================================================================
// Promotions
// =============================================================================

#[tokio::test]
async fn test_apply_order_promotion() {
    let h = harness().await;
    ten_percent(&h).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;

    let detail = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap();

    assert_eq!(detail.order.gross_total, 20000);
    assert_eq!(detail.order.discount_amount, 2000);
    assert_eq!(detail.order.net_total, 18000);
    assert_eq!(detail.order.applied_promotion_id.as_deref(), Some("promo-10"));
    assert!(detail.order.totals_consistent());
}

#[tokio::test]
async fn test_item_promotion_is_capped() {
    let h = harness().await;
    let mut def = definition(promotion(
        "promo-pastry",
        PromotionScope::Item,
        DiscountType::Percentage,
        50,
        Some(1000),
    ));
    def.targets.push(PromotionTarget {
        id: Uuid::new_v4().to_string(),
        promotion_id: "promo-pastry".to_string(),
        target_type: PromotionTargetType::Category,
        target_id: "pastry".to_string(),
    });
    h.add_promotion(def).await;

    let order = h
        .create(vec![
            OrderLineRequest::new(CROISSANT, 2),
            OrderLineRequest::new(ESPRESSO, 1),
        ])
        .await
        .unwrap()
        .order;

    let detail = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-pastry")
        .await
        .unwrap();

    assert_eq!(detail.order.discount_amount, 1000);
    assert_eq!(detail.order.net_total, 19000);
}

#[tokio::test]
async fn test_promotions_replace_each_other() {
    let h = harness().await;
    ten_percent(&h).await;
    h.add_promotion(definition(promotion(
        "promo-fixed",
        PromotionScope::Order,
        DiscountType::FixedAmount,
        3000,
        None,
    )))
    .await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;

    h.service
        .apply_promotion(cashier(), &order.id, "promo-fixed")
        .await
        .unwrap();
    let detail = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap();

    assert_eq!(detail.order.discount_amount, 2000);
    assert_eq!(detail.order.applied_promotion_id.as_deref(), Some("promo-10"));
}

#[tokio::test]
async fn test_unmet_rule_rejects_and_leaves_totals() {
    let h = harness().await;
    let mut def = definition(promotion(
        "promo-big",
        PromotionScope::Order,
        DiscountType::Percentage,
        10,
        None,
    ));
    def.rules
        .push(rule("promo-big", PromotionRuleType::MinimumOrderAmount, "50000"));
    h.add_promotion(def).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;

    let err = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-big")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::PromotionNotApplicable);
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.order.discount_amount, 0);
    assert!(detail.order.applied_promotion_id.is_none());
}

#[tokio::test]
async fn test_unreadable_rule_is_skipped() {
    let h = harness().await;
    let mut def = definition(promotion(
        "promo-odd",
        PromotionScope::Order,
        DiscountType::Percentage,
        10,
        None,
    ));
    def.rules
        .push(rule("promo-odd", PromotionRuleType::MinimumOrderAmount, "lots"));
    h.add_promotion(def).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;

    let detail = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-odd")
        .await
        .unwrap();

    assert_eq!(detail.order.discount_amount, 2000);
}

#[tokio::test]
async fn test_missing_or_expired_promotion() {
    let h = harness().await;
    let mut expired = promotion(
        "promo-old",
        PromotionScope::Order,
        DiscountType::Percentage,
        10,
        None,
    );
    expired.start_date = Utc::now() - chrono::Duration::days(10);
    expired.end_date = Utc::now() - chrono::Duration::days(1);
    h.add_promotion(definition(expired)).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;

    let err = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-404")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-old")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PromotionNotApplicable);
}

// =============================================================================
// Cancel / Status
// =============================================================================

#[tokio::test]
async fn test_cancel_returns_stock() {
    let h = harness().await;
    ten_percent(&h).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap();

    let detail = h
        .service
        .cancel_order(
            cashier(),
            &order.id,
            CancelOrderRequest {
                reason: Some("customer left".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Cancelled);
    assert_eq!(detail.order.cancellation_reason.as_deref(), Some("customer left"));
    assert_eq!(h.stock(ESPRESSO).await, 10);

    let last = h.ledger(ESPRESSO).await.pop().unwrap();
    assert_eq!(last.change_amount, 2);
    assert_eq!(last.change_type, StockChangeType::Return);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_voids_gateway_transaction_first() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    h.service
        .cancel_order(cashier(), &order.id, CancelOrderRequest::default())
        .await
        .unwrap();

    assert_eq!(
        h.gateway.calls(),
        vec![
            format!("charge:{}:20000", order.id),
            format!("cancel:{}", order.id)
        ]
    );
    assert_eq!(h.stock(ESPRESSO).await, 10);
}

#[tokio::test]
async fn test_cancel_fails_closed_when_gateway_cancel_fails() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();
    h.gateway.fail_cancel.store(true, Ordering::SeqCst);

    let err = h
        .service
        .cancel_order(cashier(), &order.id, CancelOrderRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::GatewayError);
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Open);
    assert_eq!(h.stock(ESPRESSO).await, 8);
}

#[tokio::test]
async fn test_cancel_fails_closed_when_gateway_hangs() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();
    h.gateway.hang_cancel.store(true, Ordering::SeqCst);

    let err = h
        .service
        .cancel_order(cashier(), &order.id, CancelOrderRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Gateway(ref msg) if msg.contains("timed out")));
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Open);
}

#[tokio::test]
async fn test_cancel_requires_open_order() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .update_status(cashier(), &order.id, OrderStatus::Served)
        .await
        .unwrap();

    let err = h
        .service
        .cancel_order(cashier(), &order.id, CancelOrderRequest::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::OrderNotCancellable);
    assert_eq!(h.stock(ESPRESSO).await, 9);
}

#[tokio::test]
async fn test_status_update_to_cancelled_returns_stock() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(CROISSANT, 2)]).await.unwrap().order;
    h.service
        .update_status(cashier(), &order.id, OrderStatus::InProgress)
        .await
        .unwrap();

    let detail = h
        .service
        .update_status(cashier(), &order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Cancelled);
    assert_eq!(h.stock(CROISSANT).await, 5);
}

#[tokio::test]
async fn test_status_machine_closure() {
    let h = harness().await;

    for from in OrderStatus::ALL {
        let order = h.create(vec![OrderLineRequest::new(TEA, 1)]).await.unwrap().order;
        match from {
            OrderStatus::Open => {}
            OrderStatus::Cancelled => {
                h.service
                    .cancel_order(cashier(), &order.id, CancelOrderRequest::default())
                    .await
                    .unwrap();
            }
            other => {
                h.service
                    .update_status(cashier(), &order.id, other)
                    .await
                    .unwrap();
            }
        }

        for to in OrderStatus::ALL {
            if tally_core::status::can_transition(from, to) {
                continue;
            }
            let err = h
                .service
                .update_status(cashier(), &order.id, to)
                .await
                .unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidStatusTransition { .. }),
                "{} -> {} should be rejected",
                from,
                to
            );
            let current = h.service.get_order(&order.id).await.unwrap().order.status;
            assert_eq!(current, from);
        }
    }
}

// =============================================================================
// Manual Payment
// =============================================================================

async fn discounted_order(h: &Harness) -> Order {
    ten_percent(h).await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap()
        .order
}

fn pay(method: &str, cash: Option<i64>) -> ManualPaymentRequest {
    ManualPaymentRequest {
        payment_method_id: method.to_string(),
        cash_received: cash,
    }
}

#[tokio::test]
async fn test_cash_payment_defaults_to_exact_amount() {
    let h = harness().await;
    let order = discounted_order(&h).await;
    assert_eq!(order.net_total, 18000);

    let detail = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", Some(0)))
        .await
        .unwrap();

    assert_eq!(detail.order.payment_method_id.as_deref(), Some("cash"));
    assert_eq!(detail.order.cash_received, Some(18000));
    assert_eq!(detail.order.change_due, Some(0));
    assert_eq!(detail.order.status, OrderStatus::Open);
}

#[tokio::test]
async fn test_cash_payment_change_and_shortfall() {
    let h = harness().await;
    let order = discounted_order(&h).await;

    let err = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", Some(10000)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentFailed);

    let detail = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", Some(20000)))
        .await
        .unwrap();
    assert_eq!(detail.order.cash_received, Some(20000));
    assert_eq!(detail.order.change_due, Some(2000));
}

#[tokio::test]
async fn test_card_payment_is_exact() {
    let h = harness().await;
    let order = discounted_order(&h).await;

    let detail = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("card", Some(50000)))
        .await
        .unwrap();

    assert_eq!(detail.order.cash_received, Some(18000));
    assert_eq!(detail.order.change_due, Some(0));
}

#[tokio::test]
async fn test_payment_rejections() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;

    let err = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("bitcoin", None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("voucher", None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    h.service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", None))
        .await
        .unwrap();
    let err = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyPaid);

    let cancelled = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .cancel_order(cashier(), &cancelled.id, CancelOrderRequest::default())
        .await
        .unwrap();
    let err = h
        .service
        .confirm_manual_payment(cashier(), &cancelled.id, pay("cash", None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentFailed);
}

// =============================================================================
// Gateway Payment
// =============================================================================

#[tokio::test]
async fn test_initiate_gateway_payment_stores_reference() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;

    let charge = h
        .service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    assert_eq!(charge.transaction_id, format!("tx-{}", order.id));
    assert_eq!(charge.actions.len(), 1);
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(
        detail.order.payment_gateway_reference.as_deref(),
        Some(charge.transaction_id.as_str())
    );

    h.service
        .confirm_manual_payment(cashier(), &order.id, pay("card", None))
        .await
        .unwrap();
    let err = h
        .service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyPaid);
}

#[tokio::test]
async fn test_settlement_notification_is_idempotent() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    let outcome = h.pay_by_gateway(&order.id, "settlement").await.unwrap();
    assert_eq!(outcome, NotificationOutcome::Applied(OrderStatus::Paid));
    let after_first = h.service.get_order(&order.id).await.unwrap().order;
    assert_eq!(after_first.status, OrderStatus::Paid);

    let outcome = h.pay_by_gateway(&order.id, "settlement").await.unwrap();
    assert_eq!(outcome, NotificationOutcome::AlreadyFinal(OrderStatus::Paid));
    let after_second = h.service.get_order(&order.id).await.unwrap().order;
    assert_eq!(after_second.updated_at, after_first.updated_at);
    assert_eq!(h.ledger(ESPRESSO).await.len(), 1);

    let events = h.audit_events(3).await;
    let notification = events
        .iter()
        .find(|e| e.action == AuditAction::GatewayNotification)
        .unwrap();
    assert_eq!(notification.actor_id, cashier());
}

#[tokio::test]
async fn test_expired_notification_cancels_and_returns_stock() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    let outcome = h.pay_by_gateway(&order.id, "expire").await.unwrap();

    assert_eq!(outcome, NotificationOutcome::Applied(OrderStatus::Cancelled));
    assert_eq!(h.stock(ESPRESSO).await, 10);
    let redelivered = h.pay_by_gateway(&order.id, "deny").await.unwrap();
    assert_eq!(redelivered, NotificationOutcome::AlreadyFinal(OrderStatus::Cancelled));
    assert_eq!(h.stock(ESPRESSO).await, 10);
}

#[tokio::test]
async fn test_intermediate_notification_is_ignored() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    let outcome = h.pay_by_gateway(&order.id, "pending").await.unwrap();

    assert_eq!(outcome, NotificationOutcome::Ignored);
    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Open);
}

#[tokio::test]
async fn test_notification_rejections() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;

    // No charge was initiated, so no order carries this reference.
    let err = h.pay_by_gateway(&order.id, "settlement").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = h.pay_by_gateway("not-an-order-id", "settlement").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let err = h
        .pay_by_gateway(&Uuid::new_v4().to_string(), "settlement")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    h.gateway.reject_signatures.store(true, Ordering::SeqCst);
    let err = h.pay_by_gateway(&order.id, "settlement").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SignatureInvalid);

    let detail = h.service.get_order(&order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Open);
}

#[tokio::test]
async fn test_gateway_settled_order_is_not_payable_again() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();
    h.pay_by_gateway(&order.id, "settlement").await.unwrap();

    let err = h
        .service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyPaid);

    let err = h
        .service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", Some(20000)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyPaid);

    let err = h
        .service
        .update_status(cashier(), &order.id, OrderStatus::Open)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStatusTransition);

    let detail = h.service.get_order(&order.id).await.unwrap().order;
    assert_eq!(detail.status, OrderStatus::Paid);
    assert!(detail.payment_method_id.is_none());
    assert_eq!(
        detail.payment_gateway_reference,
        Some(format!("tx-{}", order.id))
    );
    assert_eq!(h.gateway.calls(), vec![format!("charge:{}:20000", order.id)]);
}

#[tokio::test]
async fn test_pending_charge_blocks_a_second_charge() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;
    h.service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap();

    let err = h
        .service
        .initiate_gateway_payment(cashier(), &order.id)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::PaymentFailed);
    assert_eq!(h.gateway.calls().len(), 1);
    let detail = h.service.get_order(&order.id).await.unwrap().order;
    assert_eq!(
        detail.payment_gateway_reference,
        Some(format!("tx-{}", order.id))
    );
}

#[tokio::test]
async fn test_paid_open_order_rejects_item_and_promotion_changes() {
    let h = harness().await;
    let order = h.create(vec![OrderLineRequest::new(ESPRESSO, 2)]).await.unwrap().order;
    ten_percent(&h).await;
    h.service
        .confirm_manual_payment(cashier(), &order.id, pay("cash", Some(20000)))
        .await
        .unwrap();

    let err = h
        .service
        .update_items(
            cashier(),
            &order.id,
            UpdateItemsRequest {
                items: vec![OrderLineRequest::new(ESPRESSO, 5)],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::OrderNotModifiable {
            status: OrderStatus::Open,
            ..
        }
    ));

    let err = h
        .service
        .apply_promotion(cashier(), &order.id, "promo-10")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OrderNotModifiable);

    let detail = h.service.get_order(&order.id).await.unwrap().order;
    assert_eq!(detail.net_total, 20000);
    assert_eq!(detail.cash_received, Some(20000));
    assert_eq!(detail.change_due, Some(0));
    assert!(detail.applied_promotion_id.is_none());
    assert_eq!(h.stock(ESPRESSO).await, 8);
}

// =============================================================================
// Reads / Properties
// =============================================================================

#[tokio::test]
async fn test_list_orders_pages_and_filters() {
    let h = harness().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.create(vec![OrderLineRequest::new(TEA, 1)]).await.unwrap().order.id);
    }
    h.service
        .cancel_order(cashier(), &ids[0], CancelOrderRequest::default())
        .await
        .unwrap();

    let first = h.service.list_orders(ListOrdersQuery::default()).await.unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.per_page, 2);
    assert_eq!(first.data.len(), 2);

    let second = h
        .service
        .list_orders(ListOrdersQuery {
            page: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.data.len(), 1);

    let clamped = h
        .service
        .list_orders(ListOrdersQuery {
            per_page: Some(50),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(clamped.per_page, 3);

    let cancelled = h
        .service
        .list_orders(ListOrdersQuery {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.data[0].id, ids[0]);

    let err = h
        .service
        .list_orders(ListOrdersQuery {
            page: 0,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let h = harness().await;
    let err = h.service.get_order("missing").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_stock_conservation_and_money_invariant() {
    let h = harness().await;
    ten_percent(&h).await;

    let a = h
        .create(vec![
            OrderLineRequest::new(ESPRESSO, 3),
            OrderLineRequest::new(CROISSANT, 2),
        ])
        .await
        .unwrap()
        .order;
    let b = h.create(vec![OrderLineRequest::new(ESPRESSO, 1)]).await.unwrap().order;

    let mut orders = vec![
        h.service
            .apply_promotion(cashier(), &a.id, "promo-10")
            .await
            .unwrap()
            .order,
        h.service
            .update_items(
                cashier(),
                &a.id,
                UpdateItemsRequest {
                    items: vec![OrderLineRequest::new(ESPRESSO, 1), OrderLineRequest::new(TEA, 4)],
                },
            )
            .await
            .unwrap()
            .order,
        h.service
            .apply_promotion(cashier(), &a.id, "promo-10")
            .await
            .unwrap()
            .order,
        h.service
            .cancel_order(cashier(), &b.id, CancelOrderRequest::default())
            .await
            .unwrap()
            .order,
    ];
    orders.push(h.service.get_order(&a.id).await.unwrap().order);

    for order in &orders {
        assert!(order.totals_consistent(), "order {} totals broken", order.id);
        assert!(order.discount_amount <= order.gross_total);
    }

    for product_id in [ESPRESSO, CROISSANT, TEA] {
        let audit = h.service.audit_stock(product_id).await.unwrap();
        assert!(audit.is_consistent(), "{:?}", audit);
        assert!(audit.live_stock >= 0);
    }
    assert_eq!(h.stock(ESPRESSO).await, 9);
    assert_eq!(h.stock(CROISSANT).await, 5);
    assert_eq!(h.stock(TEA).await, 16);
}

#[tokio::test]
async fn test_audit_failures_do_not_affect_results() {
    struct Broken;

    #[async_trait]
    impl ActivityLogger for Broken {
        async fn log(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("activity log offline")
        }
    }

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(&db).await;
    let (audit, _worker) = AuditDispatcher::spawn(Arc::new(Broken), 1, Duration::from_millis(50));
    let service = OrderService::new(
        db,
        Arc::new(FakeGateway::default()),
        audit,
        ServiceSettings::default(),
    );

    for _ in 0..3 {
        service
            .create_order(
                cashier(),
                CreateOrderRequest {
                    order_type: OrderType::DineIn,
                    items: vec![OrderLineRequest::new(TEA, 1)],
                    notes: None,
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_overflowing_line_is_rejected_without_writes() {
    let h = harness().await;
    {
        let mut uow = h.service.database().begin().await.unwrap();
        uow.products()
            .insert(&product("p-gold", "Gold Bar", "pastry", i64::MAX / 2, 10, true))
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }

    let err = h
        .create(vec![OrderLineRequest::new("p-gold", 3)])
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidInput);
    assert_eq!(h.order_count().await, 0);
    assert_eq!(h.stock("p-gold").await, 10);
    assert!(h.ledger("p-gold").await.is_empty());
}
