use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use faka_engine::{
    db_types::{NewOrder, OrderStatusType},
    traits::StorefrontDatabase,
};

use super::helpers::{
    admin,
    callback_signed_with,
    checkout,
    json,
    new_store,
    product_with_stock,
    query_string,
    send,
    signed_callback,
};
use crate::middleware::API_KEY_HEADER;

#[actix_web::test]
async fn admin_routes_need_the_key() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let (status, body) = send(&db, TestRequest::get().uri("/admin/settings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body)["error"].is_string());

    let req = TestRequest::get().uri("/admin/coupons").insert_header((API_KEY_HEADER, "guess"));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post().uri("/admin/orders/expire").insert_header((API_KEY_HEADER, ""));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&db, admin(TestRequest::get().uri("/admin/coupons"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn manual_fulfilment() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1", "CODE-2"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let mark_paid = || {
        admin(TestRequest::patch().uri(&format!("/admin/orders/{order_no}")))
            .set_json(serde_json::json!({"action": "MARK_PAID"}))
    };

    let (status, body) = send(&db, mark_paid()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json(&body);
    assert_eq!(result["outcome"], "paid");
    assert_eq!(result["order"]["status"], "PAID");
    assert_eq!(result["order"]["paymentMethod"], "manual");
    assert_eq!(result["licenses"].as_array().unwrap().len(), 1);

    let (status, body) = send(&db, mark_paid()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["outcome"], "alreadyPaid");

    // A gateway notification arriving after the manual fulfilment changes nothing
    let params = signed_callback(order_no.as_str(), "TRADE_SUCCESS");
    let uri = format!("/api/payments/epay/notify?{}", query_string(&params));
    let (_, body) = send(&db, TestRequest::get().uri(&uri)).await;
    assert_eq!(body, "success");
    let order = db.fetch_order(&order_no).await.unwrap().unwrap();
    assert_eq!(order.payment_method, "manual");
}

#[actix_web::test]
async fn manual_fulfilment_errors() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let req = admin(TestRequest::patch().uri("/admin/orders/ORD-0-000000"))
        .set_json(serde_json::json!({"action": "MARK_PAID"}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let req = admin(TestRequest::patch().uri(&format!("/admin/orders/{order_no}")))
        .set_json(serde_json::json!({"action": "REFUND"}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let order = db.fetch_order(&order_no).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn expire_stale_orders() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1", "CODE-2"]).await;
    let stale = NewOrder::new(product.id, 1, "alice@example.com", "alipay")
        .with_created_at(Utc::now() - Duration::minutes(45));
    let stale = db.create_order(stale).await.unwrap();
    let fresh = checkout(&db, product.id, 1, "bob@example.com").await;

    let (status, body) = send(&db, admin(TestRequest::post().uri("/admin/orders/expire"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json(&body);
    assert_eq!(result["expiredCount"], 1);
    assert_eq!(result["orders"], serde_json::json!([stale.order_no.as_str()]));
    assert_eq!(db.fetch_order(&fresh).await.unwrap().unwrap().status, OrderStatusType::Pending);

    let (_, body) = send(&db, admin(TestRequest::post().uri("/admin/orders/expire"))).await;
    assert_eq!(json(&body)["expiredCount"], 0);
}

#[actix_web::test]
async fn import_and_list_licenses() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 10, &[]).await;
    let req = admin(TestRequest::post().uri("/admin/licenses")).set_json(serde_json::json!({
        "productId": product.id,
        "codes": ["AAA-111", "", "  BBB-222  ", "CCC-333"],
    }));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body), serde_json::json!({"productId": product.id, "imported": 3}));

    let uri = format!("/admin/licenses?productId={}", product.id);
    let (status, body) = send(&db, admin(TestRequest::get().uri(&uri))).await;
    assert_eq!(status, StatusCode::OK);
    let licenses = json(&body);
    let mut codes =
        licenses.as_array().unwrap().iter().map(|l| l["code"].as_str().unwrap().to_string()).collect::<Vec<String>>();
    codes.sort();
    assert_eq!(codes, vec!["AAA-111", "BBB-222", "CCC-333"]);
    assert!(licenses.as_array().unwrap().iter().all(|l| l["status"] == "AVAILABLE"));

    let req = admin(TestRequest::post().uri("/admin/licenses"))
        .set_json(serde_json::json!({"productId": 999, "codes": ["X"]}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn coupon_admin() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let create = || {
        admin(TestRequest::post().uri("/admin/coupons")).set_json(serde_json::json!({
            "code": "summer",
            "discountType": "FIXED",
            "discountValue": 500,
        }))
    };
    let (status, body) = send(&db, create()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let coupon = json(&body);
    assert_eq!(coupon["code"], "SUMMER");
    assert_eq!(coupon["used"], false);
    let (status, _) = send(&db, create()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = admin(TestRequest::post().uri("/admin/coupons")).set_json(serde_json::json!({
        "code": "HALF",
        "discountType": "PERCENTAGE",
        "discountValue": 150,
    }));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = admin(TestRequest::post().uri("/admin/coupons/bulk")).set_json(serde_json::json!({
        "count": 3,
        "prefix": "vip",
        "discountType": "PERCENTAGE",
        "discountValue": 20,
    }));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let batch = json(&body);
    let batch = batch.as_array().unwrap();
    assert_eq!(batch.len(), 3);
    assert!(batch.iter().all(|c| c["code"].as_str().unwrap().starts_with("VIP-")));

    let (status, body) = send(&db, admin(TestRequest::get().uri("/admin/coupons"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().unwrap().len(), 4);
    let (_, body) = send(&db, admin(TestRequest::get().uri("/admin/coupons?limit=2"))).await;
    assert_eq!(json(&body).as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn settings_round_trip() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let req = admin(TestRequest::post().uri("/admin/settings")).set_json(serde_json::json!({
        "site_name": "Night Shop",
        "admin_password": "hunter2",
        "epay_pid": 1001,
    }));
    let (status, body) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["success"], true);

    let (status, body) = send(&db, admin(TestRequest::get().uri("/admin/settings"))).await;
    assert_eq!(status, StatusCode::OK);
    let settings = json(&body);
    assert_eq!(settings["site_name"], "Night Shop");
    assert_eq!(settings["epay_pid"], "1001");
    assert!(settings.get("admin_password").is_none());
    assert!(!body.contains("hunter2"));
}

#[actix_web::test]
async fn rotated_gateway_key_applies_immediately() {
    let _ = env_logger::try_init();
    let db = new_store().await;
    let product = product_with_stock(&db, 100, &["CODE-1"]).await;
    let order_no = checkout(&db, product.id, 1, "alice@example.com").await;
    let req = admin(TestRequest::post().uri("/admin/settings")).set_json(serde_json::json!({"epay_key": "rotated"}));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::OK);

    let stale = signed_callback(order_no.as_str(), "TRADE_SUCCESS");
    let uri = format!("/api/payments/epay/notify?{}", query_string(&stale));
    let (status, body) = send(&db, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "fail");

    let fresh = callback_signed_with(order_no.as_str(), "TRADE_SUCCESS", "rotated");
    let uri = format!("/api/payments/epay/notify?{}", query_string(&fresh));
    let (status, body) = send(&db, TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");
}
