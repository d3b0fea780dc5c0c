use actix_web::{http::StatusCode, test::TestRequest};

use super::helpers::{checkout, json, new_store, product_with_stock, send};

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let (status, body) = send(&db, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn checkout_returns_signed_payment_url() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["A", "B", "C"]).await;
    let req = TestRequest::post().uri("/api/orders").set_json(serde_json::json!({
        "productId": product.id,
        "quantity": 2,
        "buyerContact": "alice@example.com",
        "paymentMethod": "wxpay",
    }));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json(&body);
    let order_no = result["orderNo"].as_str().unwrap();
    assert!(order_no.starts_with("ORD-"));
    assert_eq!(result["totalAmount"], 20_000);
    let pay_url = result["payUrl"].as_str().unwrap();
    assert!(pay_url.starts_with("https://pay.example.com/submit.php?"));
    assert!(pay_url.contains("money=200.00"));
    assert!(pay_url.contains("type=wxpay"));
    assert!(pay_url.contains(&format!("out_trade_no={order_no}")));
    assert!(pay_url.contains("sign_type=MD5"));
    let notify_url = urlencoding::encode("https://shop.example.com/api/payments/epay/notify").into_owned();
    assert!(pay_url.contains(&notify_url));
}

#[actix_web::test]
async fn checkout_unknown_product() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(serde_json::json!({"productId": 999, "buyerContact": "alice@example.com"}));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("999"));
}

#[actix_web::test]
async fn checkout_more_than_in_stock() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["A"]).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(serde_json::json!({"productId": product.id, "quantity": 2, "buyerContact": "alice@example.com"}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn checkout_with_bad_input() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["A"]).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(serde_json::json!({"productId": product.id, "quantity": 0, "buyerContact": "alice@example.com"}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(serde_json::json!({"productId": product.id, "buyerContact": "  "}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = TestRequest::post().uri("/api/orders").set_json(serde_json::json!({
        "productId": product.id,
        "quantity": 7_686_143_364_045_647_i64,
        "buyerContact": "alice@example.com",
    }));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn coupon_is_consumed_at_checkout() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["A", "B"]).await;
    let create = TestRequest::post().uri("/admin/coupons").set_json(serde_json::json!({
        "code": "save10",
        "discountType": "PERCENTAGE",
        "discountValue": 10,
    }));
    let (status, body) = send(&db, super::helpers::admin(create)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = |code: &str| {
        TestRequest::post().uri("/api/orders").set_json(serde_json::json!({
            "productId": product.id,
            "buyerContact": "alice@example.com",
            "couponCode": code,
        }))
    };
    let (status, body) = send(&db, order("SAVE10")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["totalAmount"], 9_000);
    // The first order is never paid, but the coupon stays spent
    let (status, body) = send(&db, order("save10")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let (status, _) = send(&db, order("NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_status_withholds_codes_until_paid() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let (status, body) = send(&db, TestRequest::get().uri(&format!("/api/orders/{order_no}"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&body);
    assert_eq!(summary["status"], "PENDING");
    assert_eq!(summary["productName"], "VIP");
    assert_eq!(summary["licenses"], serde_json::json!([]));
    assert!(!body.contains("CODE-1"));

    let (status, _) = send(&db, TestRequest::get().uri("/api/orders/ORD-0-000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_lookup() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 10, &["A", "B", "C"]).await;
    let first = checkout(&db, product.id, 1, "alice@example.com").await;
    let second = checkout(&db, product.id, 1, "alice@example.com").await;
    let _ = checkout(&db, product.id, 1, "bob@example.com").await;

    let (status, body) = send(&db, TestRequest::get().uri("/api/orders/query?q=alice%40example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o["contact"] == "alice@example.com"));

    let (status, body) = send(&db, TestRequest::get().uri(&format!("/api/orders/query?q={first}"))).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["orderNo"], first.as_str());
    assert_ne!(orders[0]["orderNo"], second.as_str());

    let (status, body) = send(&db, TestRequest::get().uri("/api/orders/query?q=nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!([]));

    let (status, _) = send(&db, TestRequest::get().uri("/api/orders/query?q=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn validate_coupon() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["A"]).await;
    let create = TestRequest::post().uri("/admin/coupons").set_json(serde_json::json!({
        "code": "TENOFF",
        "discountType": "FIXED",
        "discountValue": 1000,
        "productId": product.id,
    }));
    let (status, _) = send(&db, super::helpers::admin(create)).await;
    assert_eq!(status, StatusCode::OK);

    let check = |code: &str, product_id: i64| {
        TestRequest::post()
            .uri("/api/coupons/validate")
            .set_json(serde_json::json!({"code": code, "productId": product_id}))
    };
    let (status, body) = send(&db, check("tenoff", product.id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body), serde_json::json!({"code": "TENOFF", "discountType": "FIXED", "discountValue": 1000}));
    let other = product_with_stock(&db, 50, &[]).await;
    let (status, _) = send(&db, check("TENOFF", other.id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&db, check("MISSING", product.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn traffic_query_needs_a_username() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let (status, body) = send(&db, TestRequest::get().uri("/api/traffic/query?username=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());
}
