use std::collections::BTreeMap;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use chrono::Duration;
use faka_common::{Amount, Secret};
use faka_engine::{
    db_types::{NewProduct, OrderNo, Product},
    events::EventProducers,
    helpers::{
        epay::{canonical_params, md5_signature},
        GatewayConfig,
        SignScheme,
    },
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CouponApi,
    InventoryApi,
    OrderFlowApi,
    SettingsApi,
    SqliteDatabase,
};
use log::debug;
use serde_json::Value;
use traffic_tools::TrafficConfig;

use crate::{
    config::ServerOptions,
    integrations::traffic::TrafficProvisioner,
    middleware::API_KEY_HEADER,
    server::configure_routes,
};

pub const ADMIN_KEY: &str = "admin-key-for-tests";
pub const MERCHANT_KEY: &str = "merchant-secret";
pub const PUBLIC_URL: &str = "https://shop.example.com";

pub async fn new_store() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

pub fn gateway() -> GatewayConfig {
    GatewayConfig {
        api_url: "https://pay.example.com/".into(),
        pid: "1001".into(),
        key: Secret::new(MERCHANT_KEY.to_string()),
        sign_scheme: SignScheme::Md5,
        site_name: "Faka".into(),
        ..Default::default()
    }
}

/// A product priced in whole yuan with `codes` in its pool.
pub async fn product_with_stock(db: &SqliteDatabase, price: i64, codes: &[&str]) -> Product {
    let api = InventoryApi::new(db.clone());
    let product = api.create_product(NewProduct::new("VIP", Amount::from_yuan(price))).await.unwrap();
    if !codes.is_empty() {
        let codes = codes.iter().map(|c| c.to_string()).collect::<Vec<String>>();
        api.import_licenses(product.id, &codes).await.unwrap();
    }
    product
}

/// A notification as the gateway would send it, signed with `key`.
pub fn callback_signed_with(order_no: &str, trade_status: &str, key: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("pid".to_string(), "1001".to_string());
    params.insert("trade_no".to_string(), "2024061012000001".to_string());
    params.insert("out_trade_no".to_string(), order_no.to_string());
    params.insert("type".to_string(), "alipay".to_string());
    params.insert("name".to_string(), "VIP x1".to_string());
    params.insert("money".to_string(), "100.00".to_string());
    params.insert("trade_status".to_string(), trade_status.to_string());
    let sign = md5_signature(&canonical_params(&params), key);
    params.insert("sign".to_string(), sign);
    params.insert("sign_type".to_string(), "MD5".to_string());
    params
}

pub fn signed_callback(order_no: &str, trade_status: &str) -> BTreeMap<String, String> {
    callback_signed_with(order_no, trade_status, MERCHANT_KEY)
}

pub fn query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<String>>()
        .join("&")
}

pub fn admin(req: TestRequest) -> TestRequest {
    req.insert_header((API_KEY_HEADER, ADMIN_KEY))
}

/// Sends `req` to a store app backed by `db`, configured the way the server configures each worker. Errors raised by
/// middleware are rendered the same way the HTTP server would render them.
pub async fn send(db: &SqliteDatabase, req: TestRequest) -> (StatusCode, String) {
    let provisioner = TrafficProvisioner::new(TrafficConfig::default()).unwrap();
    let orders_api = OrderFlowApi::new(db.clone(), provisioner.clone(), EventProducers::default())
        .with_payment_window(Duration::minutes(30));
    let options = ServerOptions { public_url: PUBLIC_URL.to_string(), payment_window: Duration::minutes(30) };
    let app = App::new()
        .app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(CouponApi::new(db.clone())))
        .app_data(web::Data::new(InventoryApi::new(db.clone())))
        .app_data(web::Data::new(SettingsApi::new(db.clone())))
        .app_data(web::Data::new(gateway()))
        .app_data(web::Data::new(options))
        .app_data(web::Data::new(provisioner))
        .configure(|cfg| configure_routes::<TrafficProvisioner>(cfg, Secret::new(ADMIN_KEY.to_string())));
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            debug!("Request was rejected by middleware. {e}");
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response was not JSON ({e}): {body}"))
}

pub async fn checkout(db: &SqliteDatabase, product_id: i64, quantity: i64, contact: &str) -> OrderNo {
    let req = TestRequest::post().uri("/api/orders").set_json(serde_json::json!({
        "productId": product_id,
        "quantity": quantity,
        "buyerContact": contact,
        "paymentMethod": "alipay",
    }));
    let (status, body) = send(db, req).await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    let order_no = json(&body)["orderNo"].as_str().unwrap().to_string();
    OrderNo::from(order_no.as_str())
}
