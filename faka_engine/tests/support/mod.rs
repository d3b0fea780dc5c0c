#![allow(dead_code)]
pub mod prepare_env;

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use faka_common::{Amount, Secret};
use faka_engine::{
    db_types::{NewOrder, NewProduct, Order, OrderNo, Product},
    helpers::{epay::canonical_params, epay::md5_signature, GatewayConfig, SignScheme},
    traits::{AccountProvisioner, InventoryManagement, ProvisionedCredentials, ProvisioningError, StorefrontDatabase},
    SqliteDatabase,
};
use mockall::mock;

pub const MERCHANT_KEY: &str = "merchant-secret";

mock! {
    pub Provisioner {}
    impl AccountProvisioner for Provisioner {
        async fn provision(&self, order_no: &OrderNo) -> Result<ProvisionedCredentials, ProvisioningError>;
        async fn deprovision(&self, username: &str) -> Result<bool, ProvisioningError>;
    }
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

/// A notification as the gateway would send it, signed with the merchant key.
pub fn signed_callback(order_no: &OrderNo, trade_status: &str, money: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("pid".to_string(), "1001".to_string());
    params.insert("trade_no".to_string(), format!("T{}", rand::random::<u32>()));
    params.insert("out_trade_no".to_string(), order_no.to_string());
    params.insert("type".to_string(), "alipay".to_string());
    params.insert("name".to_string(), "VIP x1".to_string());
    params.insert("money".to_string(), money.to_string());
    params.insert("trade_status".to_string(), trade_status.to_string());
    let sign = md5_signature(&canonical_params(&params), MERCHANT_KEY);
    params.insert("sign".to_string(), sign);
    params.insert("sign_type".to_string(), "MD5".to_string());
    params
}

pub fn credentials(username: &str) -> ProvisionedCredentials {
    ProvisionedCredentials {
        username: username.to_string(),
        password: "x8k2m9qa".to_string(),
        host: "gw.example.com".to_string(),
        port: 8000,
    }
}

/// A standard product priced in whole yuan, with `codes` loaded into its pool.
pub async fn product_with_stock(db: &SqliteDatabase, price: i64, codes: &[&str]) -> Product {
    let product = db.insert_product(NewProduct::new("VIP", Amount::from_yuan(price))).await.unwrap();
    if !codes.is_empty() {
        let codes = codes.iter().map(|c| c.to_string()).collect::<Vec<String>>();
        db.import_licenses(product.id, &codes).await.unwrap();
    }
    product
}

/// Stores a pending order that was placed `minutes_ago`.
pub async fn order_placed(db: &SqliteDatabase, product_id: i64, quantity: i64, minutes_ago: i64) -> Order {
    let order = NewOrder::new(product_id, quantity, "alice@example.com", "alipay")
        .with_created_at(Utc::now() - Duration::minutes(minutes_ago));
    db.create_order(order).await.unwrap()
}
