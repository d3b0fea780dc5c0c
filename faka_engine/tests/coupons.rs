use faka_common::Amount;
use faka_engine::{
    db_types::{CouponScope, DiscountType, NewCoupon, NewProduct, OrderStatusType},
    events::EventProducers,
    helpers::CouponError,
    order_objects::{BulkCouponRequest, CheckoutRequest, CouponRequest},
    traits::{CouponManagement, InventoryManagement, StorefrontDatabase, StorefrontError},
    CouponApi,
    OrderFlowApi,
    OrderFlowError,
};
use support::{
    gateway,
    prepare_env::{prepare_test_env, random_db_path, tear_down},
    product_with_stock,
    MockProvisioner,
};

mod support;

fn checkout_with_coupon(product_id: i64, quantity: i64, code: &str) -> CheckoutRequest {
    CheckoutRequest {
        product_id,
        quantity,
        buyer_contact: "alice@example.com".into(),
        payment_method: Some("wxpay".into()),
        coupon_code: Some(code.into()),
    }
}

#[tokio::test]
async fn percentage_coupon_prices_the_order() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    let product = product_with_stock(&db, 100, &["A", "B"]).await;
    db.insert_coupon(NewCoupon::percentage("SAVE10", 10)).await.unwrap();
    // Lookup is case-insensitive
    let result = api.checkout(checkout_with_coupon(product.id, 2, "save10"), &gateway(), "http://localhost").await.unwrap();
    assert_eq!(result.total_amount, Amount::from_yuan(180));
    assert!(result.pay_url.contains("money=180.00"));
    assert!(result.pay_url.contains("type=wxpay"));
    let order = db.fetch_order(&result.order_no).await.unwrap().unwrap();
    let coupon = db.fetch_coupon("SAVE10").await.unwrap().unwrap();
    assert!(coupon.used);
    assert_eq!(coupon.order_id, Some(order.id));
    assert_eq!(order.coupon_id, Some(coupon.id));
    tear_down(db).await;
}

#[tokio::test]
async fn fixed_coupon_never_goes_below_zero() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    let product = product_with_stock(&db, 5, &["A"]).await;
    db.insert_coupon(NewCoupon::fixed("BIGFIX", Amount::from_yuan(50))).await.unwrap();
    let result = api.checkout(checkout_with_coupon(product.id, 1, "BIGFIX"), &gateway(), "http://localhost").await.unwrap();
    assert_eq!(result.total_amount, Amount::from(0));
    tear_down(db).await;
}

#[tokio::test]
async fn coupon_is_single_use() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    let product = product_with_stock(&db, 100, &["A", "B"]).await;
    db.insert_coupon(NewCoupon::percentage("ONCE", 20)).await.unwrap();
    api.checkout(checkout_with_coupon(product.id, 1, "ONCE"), &gateway(), "http://localhost").await.unwrap();
    let err = api.checkout(checkout_with_coupon(product.id, 1, "ONCE"), &gateway(), "http://localhost").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::StorefrontError(StorefrontError::CouponError(CouponError::AlreadyUsed(_)))
    ));
    // The failed checkout left no order behind
    assert_eq!(db.fetch_orders_for_contact("alice@example.com", 10).await.unwrap().len(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn concurrent_checkouts_cannot_share_a_coupon() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    let product = product_with_stock(&db, 100, &["A", "B", "C"]).await;
    db.insert_coupon(NewCoupon::percentage("RACE", 50)).await.unwrap();
    let config = gateway();
    let (r1, r2) = tokio::join!(
        api.checkout(checkout_with_coupon(product.id, 1, "RACE"), &config, "http://localhost"),
        api.checkout(checkout_with_coupon(product.id, 1, "RACE"), &config, "http://localhost"),
    );
    assert_eq!([&r1, &r2].iter().filter(|r| r.is_ok()).count(), 1);
    let orders = db.fetch_orders_for_contact("alice@example.com", 10).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].coupon_id.is_some());
    tear_down(db).await;
}

#[tokio::test]
async fn coupon_scope_is_enforced() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    let games = db.insert_category("Games").await.unwrap();
    let in_category = db
        .insert_product(NewProduct::new("Game key", Amount::from_yuan(30)).with_category(games.id))
        .await
        .unwrap();
    db.import_licenses(in_category.id, &["G1".to_string()]).await.unwrap();
    let other = product_with_stock(&db, 100, &["A"]).await;
    db.insert_coupon(NewCoupon::fixed("GAMES5", Amount::from_yuan(5)).with_scope(CouponScope::Category(games.id)))
        .await
        .unwrap();
    db.insert_coupon(NewCoupon::fixed("VIPONLY", Amount::from_yuan(5)).with_scope(CouponScope::Product(other.id)))
        .await
        .unwrap();
    let err = api.checkout(checkout_with_coupon(other.id, 1, "GAMES5"), &gateway(), "http://localhost").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::StorefrontError(StorefrontError::CouponError(CouponError::WrongCategory(_)))
    ));
    let err =
        api.checkout(checkout_with_coupon(in_category.id, 1, "VIPONLY"), &gateway(), "http://localhost").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::StorefrontError(StorefrontError::CouponError(CouponError::WrongProduct(_)))
    ));
    let err =
        api.checkout(checkout_with_coupon(other.id, 1, "NOSUCHCODE"), &gateway(), "http://localhost").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StorefrontError(StorefrontError::CouponError(CouponError::NotFound(_)))));
    // Rejected coupons are not consumed
    assert!(!db.fetch_coupon("GAMES5").await.unwrap().unwrap().used);
    let ok = api.checkout(checkout_with_coupon(in_category.id, 1, "GAMES5"), &gateway(), "http://localhost").await.unwrap();
    assert_eq!(ok.total_amount, Amount::from_yuan(25));
    tear_down(db).await;
}

#[tokio::test]
async fn new_products_and_coupons_are_usable_at_once() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default());
    for round in 0..3 {
        let category = db.insert_category(&format!("Games {round}")).await.unwrap();
        let product = NewProduct::new("VIP", Amount::from_yuan(100)).with_category(category.id);
        let product = db.insert_product(product).await.unwrap();
        assert!(db.fetch_product(product.id).await.unwrap().is_some());
        db.import_licenses(product.id, &[format!("KEY-{round}")]).await.unwrap();
        let code = format!("FRESH{round}");
        db.insert_coupon(NewCoupon::percentage(&code, 10)).await.unwrap();
        db.insert_coupon(NewCoupon::percentage(&format!("SPARE{round}"), 5)).await.unwrap();
        let result =
            api.checkout(checkout_with_coupon(product.id, 1, &code), &gateway(), "http://localhost").await.unwrap();
        assert_eq!(result.total_amount, Amount::from_yuan(90));
        assert!(db.fetch_coupon(&code).await.unwrap().unwrap().used);
    }
    tear_down(db).await;
}

/// Coupons are consumed when the order is created, not when it is paid. An abandoned order keeps its coupon.
#[tokio::test]
async fn abandoned_order_still_burns_its_coupon() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = OrderFlowApi::new(db.clone(), MockProvisioner::new(), EventProducers::default())
        .with_payment_window(chrono::Duration::zero());
    let product = product_with_stock(&db, 100, &["A", "B"]).await;
    db.insert_coupon(NewCoupon::percentage("ABANDON", 10)).await.unwrap();
    let result = api.checkout(checkout_with_coupon(product.id, 1, "ABANDON"), &gateway(), "http://localhost").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let expired = api.expire_stale_orders().await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, OrderStatusType::Expired);
    let coupon = db.fetch_coupon("ABANDON").await.unwrap().unwrap();
    assert!(coupon.used);
    let order = db.fetch_order(&result.order_no).await.unwrap().unwrap();
    assert_eq!(coupon.order_id, Some(order.id));
    let err = api.checkout(checkout_with_coupon(product.id, 1, "ABANDON"), &gateway(), "http://localhost").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::StorefrontError(StorefrontError::CouponError(CouponError::AlreadyUsed(_)))
    ));
    tear_down(db).await;
}

#[tokio::test]
async fn coupon_api_validates_without_consuming() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = CouponApi::new(db.clone());
    let product = product_with_stock(&db, 100, &["A"]).await;
    api.create(CouponRequest {
        code: " save10 ".into(),
        discount_type: DiscountType::Percentage,
        discount_value: 10,
        product_id: None,
        category_id: None,
    })
    .await
    .unwrap();
    let check = api.validate("Save10", product.id).await.unwrap();
    assert_eq!(check.code, "SAVE10");
    assert_eq!(check.discount_type, DiscountType::Percentage);
    assert_eq!(check.discount_value, 10);
    assert!(!db.fetch_coupon("SAVE10").await.unwrap().unwrap().used);
    let err = api.validate("MISSING", product.id).await.unwrap_err();
    assert_eq!(err, StorefrontError::CouponError(CouponError::NotFound("MISSING".into())));
    let err = api.validate("SAVE10", product.id + 1).await.unwrap_err();
    assert!(matches!(err, StorefrontError::ProductNotFound(_)));
    tear_down(db).await;
}

#[tokio::test]
async fn coupon_api_rejects_bad_definitions() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = CouponApi::new(db.clone());
    let request = |code: &str, discount_type, discount_value, product_id, category_id| CouponRequest {
        code: code.into(),
        discount_type,
        discount_value,
        product_id,
        category_id,
    };
    let err = api.create(request("PCT", DiscountType::Percentage, 150, None, None)).await.unwrap_err();
    assert!(matches!(err, StorefrontError::CouponError(CouponError::InvalidDefinition(_))));
    let err = api.create(request("FIX", DiscountType::Fixed, 0, None, None)).await.unwrap_err();
    assert!(matches!(err, StorefrontError::CouponError(CouponError::InvalidDefinition(_))));
    let err = api.create(request("BOTH", DiscountType::Fixed, 100, Some(1), Some(1))).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InvalidInput(_)));
    let err = api.create(request("  ", DiscountType::Fixed, 100, None, None)).await.unwrap_err();
    assert!(matches!(err, StorefrontError::InvalidInput(_)));
    api.create(request("DUP", DiscountType::Fixed, 100, None, None)).await.unwrap();
    let err = api.create(request("dup", DiscountType::Fixed, 100, None, None)).await.unwrap_err();
    assert_eq!(err, StorefrontError::CouponAlreadyExists("DUP".into()));
    tear_down(db).await;
}

#[tokio::test]
async fn bulk_generation() {
    let db = prepare_test_env(&random_db_path()).await;
    let api = CouponApi::new(db.clone());
    let request = BulkCouponRequest {
        count: 50,
        prefix: Some("vip".into()),
        length: 6,
        discount_type: DiscountType::Fixed,
        discount_value: 500,
        product_id: None,
        category_id: None,
    };
    let coupons = api.bulk_generate(request.clone()).await.unwrap();
    assert_eq!(coupons.len(), 50);
    assert!(coupons.iter().all(|c| c.code.starts_with("VIP-") && c.code.len() == 10 && !c.used));
    assert_eq!(api.list(100).await.unwrap().len(), 50);
    let too_many = BulkCouponRequest { count: 501, ..request.clone() };
    assert!(matches!(api.bulk_generate(too_many).await, Err(StorefrontError::InvalidInput(_))));
    let none = BulkCouponRequest { count: 0, ..request.clone() };
    assert!(matches!(api.bulk_generate(none).await, Err(StorefrontError::InvalidInput(_))));
    let short = BulkCouponRequest { length: 2, ..request };
    assert!(matches!(api.bulk_generate(short).await, Err(StorefrontError::InvalidInput(_))));
    tear_down(db).await;
}
