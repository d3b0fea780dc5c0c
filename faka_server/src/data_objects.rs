use std::{collections::BTreeMap, fmt::Display};

use faka_engine::db_types::{OrderNo, Setting};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of `PATCH /admin/orders/{orderNo}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyOrderParams {
    pub action: OrderAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    MarkPaid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficQueryParams {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseListParams {
    pub product_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryResult {
    pub expired_count: usize,
    pub orders: Vec<OrderNo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub product_id: i64,
    pub imported: usize,
}

/// Settings travel as a flat JSON object. Non-string values are stored in their JSON form.
pub fn settings_from_json(body: BTreeMap<String, Value>) -> Vec<Setting> {
    body.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::default(),
                v => v.to_string(),
            };
            Setting { key, value }
        })
        .collect()
}

pub fn settings_to_json(settings: Vec<Setting>) -> BTreeMap<String, String> {
    settings.into_iter().map(|s| (s.key, s.value)).collect()
}
