use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use faka_engine::{
    db_types::{NewOrder, OrderNo, OrderStatusType},
    traits::{InventoryManagement, StorefrontDatabase},
    SqliteDatabase,
};

use super::helpers::{checkout, json, new_store, product_with_stock, query_string, send, signed_callback};

async fn notify_get(db: &SqliteDatabase, order_no: &OrderNo, trade_status: &str) -> (StatusCode, String) {
    let params = signed_callback(order_no.as_str(), trade_status);
    let uri = format!("/api/payments/epay/notify?{}", query_string(&params));
    send(db, TestRequest::get().uri(&uri)).await
}

async fn order_status(db: &SqliteDatabase, order_no: &OrderNo) -> OrderStatusType {
    db.fetch_order(order_no).await.unwrap().unwrap().status
}

#[actix_web::test]
async fn paid_notification_delivers_codes() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1", "CODE-2", "CODE-3"]).await;
    let order_no = checkout(&db, product.id, 2, "alice@example.com").await;

    let (status, body) = notify_get(&db, &order_no, "TRADE_SUCCESS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");

    let (status, body) = send(&db, TestRequest::get().uri(&format!("/api/orders/{order_no}"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&body);
    assert_eq!(summary["status"], "PAID");
    assert_eq!(summary["paymentMethod"], "alipay");
    assert!(summary["paidAt"].is_string());
    let codes = summary["licenses"].as_array().unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(db.stock_level(product.id).await.unwrap(), 1);
}

#[actix_web::test]
async fn replayed_notification_delivers_once() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1", "CODE-2"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let params = signed_callback(order_no.as_str(), "TRADE_SUCCESS");
    let uri = format!("/api/payments/epay/notify?{}", query_string(&params));
    for _ in 0..3 {
        let (status, body) = send(&db, TestRequest::get().uri(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "success");
    }
    assert_eq!(order_status(&db, &order_no).await, OrderStatusType::Paid);
    assert_eq!(db.stock_level(product.id).await.unwrap(), 1);
}

#[actix_web::test]
async fn form_notification() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let params = signed_callback(order_no.as_str(), "TRADE_SUCCESS");
    let req = TestRequest::post().uri("/api/payments/epay/notify").set_form(&params);
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");
    assert_eq!(order_status(&db, &order_no).await, OrderStatusType::Paid);
}

#[actix_web::test]
async fn tampered_notification_is_rejected() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let mut params = signed_callback(order_no.as_str(), "TRADE_SUCCESS");
    params.insert("money".to_string(), "0.01".to_string());
    let uri = format!("/api/payments/epay/notify?{}", query_string(&params));
    let (status, body) = send(&db, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "fail");

    params.remove("sign");
    let uri = format!("/api/payments/epay/notify?{}", query_string(&params));
    let (status, body) = send(&db, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "fail");

    assert_eq!(order_status(&db, &order_no).await, OrderStatusType::Pending);
    assert_eq!(db.stock_level(product.id).await.unwrap(), 1);
}

#[actix_web::test]
async fn unpaid_notification_is_acknowledged() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let (status, body) = notify_get(&db, &order_no, "WAIT_BUYER_PAY").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");
    assert_eq!(order_status(&db, &order_no).await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn notification_for_unknown_order_fails() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let (status, body) = notify_get(&db, &OrderNo::from("ORD-0-000000"), "TRADE_SUCCESS").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "fail");
}

#[actix_web::test]
async fn late_payment_expires_the_order() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order = NewOrder::new(product.id, 1, "alice@example.com", "alipay")
        .with_created_at(Utc::now() - Duration::minutes(31));
    let order = db.create_order(order).await.unwrap();

    let (status, body) = notify_get(&db, &order.order_no, "TRADE_SUCCESS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");
    assert_eq!(order_status(&db, &order.order_no).await, OrderStatusType::Expired);
    assert_eq!(db.stock_level(product.id).await.unwrap(), 1);

    let (_, body) = send(&db, TestRequest::get().uri(&format!("/api/orders/{}", order.order_no))).await;
    assert_eq!(json(&body)["licenses"], serde_json::json!([]));
}
