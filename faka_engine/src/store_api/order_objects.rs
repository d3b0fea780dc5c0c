use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Amount, CouponScope, DeliveryFormat, DiscountType, License, Order, OrderNo, OrderStatusType},
    helpers::{Discount, DEFAULT_COUPON_LENGTH},
    traits::FulfilmentResult,
};

//--------------------------------------       Checkout        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(alias = "contact")]
    pub buyer_contact: String,
    /// The gateway channel, e.g. `alipay` or `wxpay`.
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub order_no: OrderNo,
    pub total_amount: Amount,
    pub pay_url: String,
}

//--------------------------------------   Payment callback    ---------------------------------------------------------
/// What happened to an authentic payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The notification did not report a completed payment. Nothing changed.
    Ignored { order_no: OrderNo, trade_status: String },
    /// The payment was presented to the order.
    Processed(FulfilmentResult),
}

//--------------------------------------     Order summary     ---------------------------------------------------------
/// The buyer-facing view of an order. Codes are only present once the order is paid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_no: OrderNo,
    pub status: OrderStatusType,
    pub product_id: i64,
    pub product_name: String,
    pub delivery_format: DeliveryFormat,
    pub quantity: i64,
    pub total_amount: Amount,
    pub payment_method: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub licenses: Vec<String>,
}

impl OrderSummary {
    pub fn new(order: Order, product_name: String, delivery_format: DeliveryFormat, licenses: &[License]) -> Self {
        let licenses = if order.status == OrderStatusType::Paid {
            licenses.iter().map(|l| l.code.clone()).collect()
        } else {
            Vec::new()
        };
        Self {
            order_no: order.order_no,
            status: order.status,
            product_id: order.product_id,
            product_name,
            delivery_format,
            quantity: order.quantity,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            created_at: order.created_at,
            paid_at: order.paid_at,
            licenses,
        }
    }
}

//--------------------------------------        Coupons        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheckRequest {
    pub code: String,
    pub product_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheck {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
}

impl CouponCheck {
    pub fn new(code: String, discount: Discount) -> Self {
        let (discount_type, discount_value) = match discount {
            Discount::Fixed(amount) => (DiscountType::Fixed, amount.value()),
            Discount::Percentage(percent) => (DiscountType::Percentage, percent),
        };
        Self { code, discount_type, discount_value }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: String,
    pub discount_type: DiscountType,
    /// Whole percent for percentage coupons, minor currency units for fixed ones.
    pub discount_value: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCouponRequest {
    pub count: usize,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_coupon_length")]
    pub length: usize,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

fn default_coupon_length() -> usize {
    DEFAULT_COUPON_LENGTH
}

/// A coupon may be bound to a product or a category, but not both.
pub fn coupon_scope(product_id: Option<i64>, category_id: Option<i64>) -> Option<CouponScope> {
    match (product_id, category_id) {
        (Some(_), Some(_)) => None,
        (Some(p), None) => Some(CouponScope::Product(p)),
        (None, Some(c)) => Some(CouponScope::Category(c)),
        (None, None) => Some(CouponScope::Global),
    }
}

//--------------------------------------       Licenses        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseImport {
    pub product_id: i64,
    pub codes: Vec<String>,
}
