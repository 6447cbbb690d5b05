//! Integration tests for sale posting, stock movements and loyalty,
//! against an in-memory SQLite database.

use chrono::Utc;

use tally_core::sale::receipt_prefix;
use tally_core::{CoreError, Customer, LineError, PaymentMethod, Product, SaleLine, User};
use tally_db::{Database, DbConfig};
use tally_engine::{ChangeEvent, Engine, EngineConfig, EngineError, SaleRequest};

async fn test_engine() -> Engine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Engine::new(db, EngineConfig::default())
}

async fn seed_user(engine: &Engine) -> User {
    engine
        .create_user(User::new("cashier", "Test Cashier"))
        .await
        .unwrap()
}

async fn seed_product(engine: &Engine, name: &str, price_cents: i64, stock: i64) -> Product {
    let mut product = Product::new(name, price_cents);
    product.stock = stock;
    engine.create_product(product).await.unwrap()
}

// =============================================================================
// Posting
// =============================================================================

#[tokio::test]
async fn post_sale_decrements_stock_and_freezes_snapshot() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let product = seed_product(&engine, "Cola 330ml", 299, 10).await;

    let receipt = engine
        .post_sale(SaleRequest::new(&user.id, vec![SaleLine::new(&product.id, 3)]))
        .await
        .unwrap();

    assert_eq!(receipt.sale.subtotal_cents, 897);
    assert_eq!(receipt.sale.total_cents, 897);
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].quantity, 3);
    assert_eq!(receipt.items[0].product_name, "Cola 330ml");
    assert_eq!(receipt.items[0].unit_price_cents, 299);

    let after = engine
        .db()
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock, 7);

    // Renaming the product later never touches the snapshot
    let mut renamed = after.clone();
    renamed.name = "Cola Classic 330ml".to_string();
    engine.update_product(renamed).await.unwrap();

    let items = engine
        .db()
        .sales()
        .items_for_sale(&receipt.sale.id)
        .await
        .unwrap();
    assert_eq!(items[0].product_name, "Cola 330ml");
}

#[tokio::test]
async fn post_sale_applies_tax_discount_and_change() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;

    let mut taxed = Product::new("Widget", 1000);
    taxed.stock = 10;
    taxed.tax_rate_bps = 825; // 8.25%
    let taxed = engine.create_product(taxed).await.unwrap();

    let mut request = SaleRequest::new(&user.id, vec![SaleLine::new(&taxed.id, 2)]);
    request.discount_cents = 100;
    request.payment_method = PaymentMethod::Cash;
    request.cash_received_cents = Some(2500);

    let receipt = engine.post_sale(request).await.unwrap();

    // 2 × $10.00 = $20.00, tax $1.65, minus $1.00 discount
    assert_eq!(receipt.sale.subtotal_cents, 2000);
    assert_eq!(receipt.sale.tax_cents, 165);
    assert_eq!(receipt.sale.total_cents, 2065);
    assert_eq!(receipt.sale.cash_received_cents, Some(2500));
    assert_eq!(receipt.sale.change_cents, Some(435));
}

#[tokio::test]
async fn receipt_numbers_are_sequential_per_day() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let product = seed_product(&engine, "Cola 330ml", 299, 100).await;

    let prefix = receipt_prefix(Utc::now().date_naive());
    for seq in 1..=3 {
        let receipt = engine
            .post_sale(SaleRequest::new(&user.id, vec![SaleLine::new(&product.id, 1)]))
            .await
            .unwrap();
        assert_eq!(
            receipt.sale.receipt_number,
            format!("{prefix}{seq:04}"),
        );
    }

    // Receipt numbers resolve back to their sale
    let found = engine
        .db()
        .sales()
        .get_by_receipt(&format!("{prefix}0002"))
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn post_sale_rejects_empty_and_collects_all_line_errors() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let product = seed_product(&engine, "Cola 330ml", 299, 2).await;

    let err = engine
        .post_sale(SaleRequest::new(&user.id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::EmptySale)));

    // Three bad lines: every violation must be reported
    let lines = vec![
        SaleLine::new(&product.id, 0),
        SaleLine::new("no-such-product", 1),
        SaleLine::new(&product.id, 5), // only 2 in stock
    ];
    let err = engine
        .post_sale(SaleRequest::new(&user.id, lines))
        .await
        .unwrap_err();

    match err {
        EngineError::Domain(CoreError::InvalidLines { errors }) => {
            assert_eq!(errors.len(), 3);
            assert!(matches!(errors[0], LineError::NonPositiveQuantity { line: 0, .. }));
            assert!(matches!(errors[1], LineError::ProductNotFound { line: 1, .. }));
            assert!(matches!(
                errors[2],
                LineError::InsufficientStock {
                    line: 2,
                    requested: 5,
                    available: 2,
                    ..
                }
            ));
        }
        other => panic!("expected InvalidLines, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_post_writes_nothing() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let good = seed_product(&engine, "Good", 500, 10).await;

    // Second line is invalid; the first must not decrement anything
    let lines = vec![
        SaleLine::new(&good.id, 2),
        SaleLine::new("no-such-product", 1),
    ];
    engine
        .post_sale(SaleRequest::new(&user.id, lines))
        .await
        .unwrap_err();

    let after = engine
        .db()
        .products()
        .get_by_id(&good.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock, 10);
    assert!(engine.db().sales().list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn untracked_products_sell_regardless_of_stock() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;

    let mut service = Product::new("Gift wrapping", 150);
    service.track_stock = false;
    service.stock = 0;
    let service = engine.create_product(service).await.unwrap();

    let receipt = engine
        .post_sale(SaleRequest::new(&user.id, vec![SaleLine::new(&service.id, 4)]))
        .await
        .unwrap();
    assert_eq!(receipt.sale.total_cents, 600);
}

#[tokio::test]
async fn post_sale_updates_customer_stats_and_loyalty() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let product = seed_product(&engine, "Widget", 1000, 10).await;
    let customer = engine
        .create_customer(Customer::new("Maria", "Lopez"))
        .await
        .unwrap();

    let mut request = SaleRequest::new(&user.id, vec![SaleLine::new(&product.id, 2)]);
    request.customer_id = Some(customer.id.clone());
    engine.post_sale(request).await.unwrap();

    let after = engine
        .db()
        .customers()
        .get_by_id(&customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.total_spent_cents, 2000);
    assert_eq!(after.total_visits, 1);
    // $20.00 at 1 point per dollar
    assert_eq!(after.loyalty_points, 20);
    assert!(after.last_visit_at.is_some());
}

#[tokio::test]
async fn post_sale_emits_change_events() {
    let engine = test_engine().await;
    let user = seed_user(&engine).await;
    let product = seed_product(&engine, "Cola 330ml", 299, 10).await;

    let mut events = engine.subscribe();
    let receipt = engine
        .post_sale(SaleRequest::new(&user.id, vec![SaleLine::new(&product.id, 1)]))
        .await
        .unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        ChangeEvent::SalePosted {
            sale_id: receipt.sale.id.clone()
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        ChangeEvent::StockChanged {
            product_id: product.id.clone()
        }
    );
}

// =============================================================================
// Product Validation
// =============================================================================

#[tokio::test]
async fn create_product_rejects_negative_stock() {
    let engine = test_engine().await;

    let mut product = Product::new("Miscounted", 299);
    product.stock = -5;
    let err = engine.create_product(product).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));

    // Products that explicitly allow negative stock may start below zero
    // (e.g. restored from a backorder ledger)
    let mut backorder = Product::new("Backorder", 299);
    backorder.stock = -5;
    backorder.allow_negative_stock = true;
    let created = engine.create_product(backorder).await.unwrap();

    let stored = engine
        .db()
        .products()
        .get_by_id(&created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stock, -5);
}

#[tokio::test]
async fn update_product_rejects_negative_cost() {
    let engine = test_engine().await;
    let product = seed_product(&engine, "Widget", 1000, 10).await;

    let mut changed = product.clone();
    changed.cost_cents = Some(-1);
    let err = engine.update_product(changed).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));

    let stored = engine
        .db()
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.cost_cents, None);
}

// =============================================================================
// Stock Primitives
// =============================================================================

#[tokio::test]
async fn stock_primitives_move_and_guard() {
    let engine = test_engine().await;
    let product = seed_product(&engine, "Cola 330ml", 299, 5).await;

    let after = engine.increase_stock(&product.id, 10).await.unwrap();
    assert_eq!(after.stock, 15);

    let after = engine.decrease_stock(&product.id, 4).await.unwrap();
    assert_eq!(after.stock, 11);

    let err = engine.decrease_stock(&product.id, 100).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(CoreError::InsufficientStock {
            requested: 100,
            available: 11,
            ..
        })
    ));

    let after = engine.set_stock(&product.id, 42).await.unwrap();
    assert_eq!(after.stock, 42);

    let err = engine.set_stock(&product.id, -1).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));

    let after = engine
        .adjust_stock(&product.id, -2, "damaged in transit")
        .await
        .unwrap();
    assert_eq!(after.stock, 40);
}

#[tokio::test]
async fn decrease_stock_on_inactive_product_reports_inactive() {
    let engine = test_engine().await;
    let product = seed_product(&engine, "Discontinued", 299, 10).await;
    engine.deactivate_product(&product.id).await.unwrap();

    // Plenty of stock on the row; the failure is the soft delete, and
    // the error must say so rather than claim insufficient stock
    let err = engine.decrease_stock(&product.id, 1).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(CoreError::ProductInactive(_))
    ));

    let stored = engine
        .db()
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stock, 10);
}

#[tokio::test]
async fn stock_queries_flag_low_and_out() {
    let engine = test_engine().await;

    let mut low = Product::new("Low", 100);
    low.stock = 2;
    low.min_stock = 5;
    engine.create_product(low).await.unwrap();

    let mut out = Product::new("Out", 100);
    out.stock = 0;
    engine.create_product(out).await.unwrap();

    let low_names: Vec<_> = engine
        .low_stock_products()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert!(low_names.contains(&"Low".to_string()));
    assert!(low_names.contains(&"Out".to_string()));

    let out_names: Vec<_> = engine
        .out_of_stock_products()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(out_names, vec!["Out".to_string()]);
}

// =============================================================================
// Loyalty
// =============================================================================

#[tokio::test]
async fn loyalty_add_and_redeem() {
    let engine = test_engine().await;
    let customer = engine
        .create_customer(Customer::new("Ana", "Silva"))
        .await
        .unwrap();

    let after = engine.add_loyalty_points(&customer.id, 50).await.unwrap();
    assert_eq!(after.loyalty_points, 50);

    let after = engine
        .redeem_loyalty_points(&customer.id, 30)
        .await
        .unwrap();
    assert_eq!(after.loyalty_points, 20);

    let err = engine
        .redeem_loyalty_points(&customer.id, 21)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(CoreError::InsufficientLoyaltyPoints {
            requested: 21,
            available: 20,
            ..
        })
    ));
}

#[tokio::test]
async fn duplicate_customer_contact_rejected() {
    let engine = test_engine().await;

    let mut first = Customer::new("Maria", "Lopez");
    first.email = Some("maria@example.com".to_string());
    engine.create_customer(first).await.unwrap();

    let mut second = Customer::new("Other", "Person");
    second.email = Some("maria@example.com".to_string());
    let err = engine.create_customer(second).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::Validation(_))));
}
