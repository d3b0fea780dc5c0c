use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
pub use faka_common::Amount;
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderNo        ---------------------------------------------------------
/// The human-shareable order number, e.g. `ORD-1718000123456-042817`. It is assigned once at checkout and never
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNo(pub String);

impl OrderNo {
    /// A new order number derived from the current time with a random suffix.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("ORD-{millis}-{suffix:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNo {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order number cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been created and is waiting for payment.
    Pending,
    /// Payment was recognised within the payment window and the goods have been allocated.
    Paid,
    /// The payment window closed before a payment was recognised.
    Expired,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Expired => write!(f, "Expired"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "expired" => Ok(Self::Expired),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_no: OrderNo,
    /// Buyer contact, usually an email address.
    pub contact: String,
    pub product_id: i64,
    pub quantity: i64,
    pub total_amount: Amount,
    pub coupon_id: Option<i64>,
    /// The payment channel requested at checkout, replaced by the settling channel when the order is paid.
    pub payment_method: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
}

impl Order {
    /// True if the payment window has closed for this order at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.created_at > window
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: OrderNo,
    pub contact: String,
    pub product_id: i64,
    pub quantity: i64,
    pub payment_method: String,
    /// The coupon code supplied at checkout, if any. It is normalised and consumed when the order is stored.
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(product_id: i64, quantity: i64, contact: &str, payment_method: &str) -> Self {
        Self {
            order_no: OrderNo::generate(),
            contact: contact.trim().to_string(),
            product_id,
            quantity,
            payment_method: payment_method.to_string(),
            coupon_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_coupon(mut self, code: &str) -> Self {
        self.coupon_code = Some(code.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------       Category        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
}

//--------------------------------------    DeliveryFormat     ---------------------------------------------------------
/// Describes how the code strings of a product are laid out, so that they can be presented as labelled fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryFormat {
    /// An opaque code, e.g. a license key.
    #[default]
    Single,
    /// `account----password`
    AccountPass,
    /// `account----password----email----email password`
    AccountFull,
    /// `number|expiry|cvv`
    VirtualCard,
    /// `host:port:user:pass`
    ProxyIp,
}

impl DeliveryFormat {
    /// Splits a code into labelled fields according to this format. Codes that do not have the expected shape are
    /// returned as a single field.
    pub fn fields<'a>(&self, code: &'a str) -> Vec<(&'static str, &'a str)> {
        let parts: Vec<&str> = match self {
            DeliveryFormat::Single => vec![],
            DeliveryFormat::AccountPass | DeliveryFormat::AccountFull => code.split("----").collect(),
            DeliveryFormat::VirtualCard => code.split('|').collect(),
            DeliveryFormat::ProxyIp => code.split(':').collect(),
        };
        let labels: &[&'static str] = match self {
            DeliveryFormat::Single => &[],
            DeliveryFormat::AccountPass => &["Account", "Password"],
            DeliveryFormat::AccountFull => &["Account", "Password", "Email", "Email password"],
            DeliveryFormat::VirtualCard => &["Card number", "Expiry", "CVV"],
            DeliveryFormat::ProxyIp => &["Host", "Port", "Username", "Password"],
        };
        if labels.is_empty() || parts.len() != labels.len() {
            return vec![("Code", code)];
        }
        labels.iter().copied().zip(parts.into_iter().map(str::trim)).collect()
    }
}

impl FromStr for DeliveryFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(Self::Single),
            "ACCOUNT_PASS" => Ok(Self::AccountPass),
            "ACCOUNT_FULL" => Ok(Self::AccountFull),
            "VIRTUAL_CARD" => Ok(Self::VirtualCard),
            "PROXY_IP" => Ok(Self::ProxyIp),
            _ => Err(ConversionError(format!("Invalid delivery format: {s}"))),
        }
    }
}

//--------------------------------------      ProductKind      ---------------------------------------------------------
/// The storage tag for [`ProductKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductKindType {
    #[default]
    Standard,
    Provisioned,
}

/// How the goods for a product are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    /// Pre-loaded license units, allocated oldest first.
    Standard,
    /// One account minted upstream per paid order. `duration` is the account lifetime; `None` means it never
    /// expires.
    Provisioned { duration: Option<Duration> },
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Amount,
    pub category_id: Option<i64>,
    pub kind: ProductKindType,
    pub provision_hours: Option<i64>,
    pub delivery_format: DeliveryFormat,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn kind(&self) -> ProductKind {
        match self.kind {
            ProductKindType::Standard => ProductKind::Standard,
            ProductKindType::Provisioned => {
                let duration = self.provision_hours.filter(|h| *h > 0).map(Duration::hours);
                ProductKind::Provisioned { duration }
            },
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self.kind(), ProductKind::Provisioned { .. })
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Amount,
    pub category_id: Option<i64>,
    pub kind: ProductKind,
    pub delivery_format: DeliveryFormat,
}

impl NewProduct {
    pub fn new(name: &str, price: Amount) -> Self {
        Self {
            name: name.to_string(),
            price,
            category_id: None,
            kind: ProductKind::Standard,
            delivery_format: DeliveryFormat::Single,
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn provisioned(mut self, duration: Option<Duration>) -> Self {
        self.kind = ProductKind::Provisioned { duration };
        self.delivery_format = DeliveryFormat::ProxyIp;
        self
    }

    pub fn with_delivery_format(mut self, format: DeliveryFormat) -> Self {
        self.delivery_format = format;
        self
    }
}

//--------------------------------------     LicenseStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenseStatus {
    Available,
    Sold,
}

impl Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseStatus::Available => write!(f, "Available"),
            LicenseStatus::Sold => write!(f, "Sold"),
        }
    }
}

//--------------------------------------        License        ---------------------------------------------------------
/// A single sellable unit. Once `Sold` it belongs to `order_id` forever.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: i64,
    pub product_id: i64,
    pub code: String,
    pub status: LicenseStatus,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     DiscountType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType {
    Fixed,
    Percentage,
}

//--------------------------------------        Coupon         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: i64,
    /// Always stored upper-cased.
    pub code: String,
    pub discount_type: DiscountType,
    /// Minor currency units for `Fixed`, whole percent for `Percentage`.
    pub discount_value: i64,
    pub product_id: Option<i64>,
    pub category_id: Option<i64>,
    pub used: bool,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn scope(&self) -> CouponScope {
        match (self.product_id, self.category_id) {
            (Some(p), _) => CouponScope::Product(p),
            (None, Some(c)) => CouponScope::Category(c),
            (None, None) => CouponScope::Global,
        }
    }
}

/// A coupon applies to one product, one category, or everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "id")]
pub enum CouponScope {
    #[default]
    Global,
    Product(i64),
    Category(i64),
}

impl CouponScope {
    pub fn product_id(&self) -> Option<i64> {
        match self {
            CouponScope::Product(id) => Some(*id),
            _ => None,
        }
    }

    pub fn category_id(&self) -> Option<i64> {
        match self {
            CouponScope::Category(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub scope: CouponScope,
}

impl NewCoupon {
    pub fn fixed(code: &str, amount: Amount) -> Self {
        Self {
            code: normalize_coupon_code(code),
            discount_type: DiscountType::Fixed,
            discount_value: amount.value(),
            scope: CouponScope::Global,
        }
    }

    pub fn percentage(code: &str, percent: i64) -> Self {
        Self {
            code: normalize_coupon_code(code),
            discount_type: DiscountType::Percentage,
            discount_value: percent,
            scope: CouponScope::Global,
        }
    }

    pub fn with_scope(mut self, scope: CouponScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Coupon codes are matched case-insensitively by storing and looking them up upper-cased.
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}

//--------------------------------------    TrafficAccount     ---------------------------------------------------------
/// The local record of an account minted upstream for a provisioned product.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAccount {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub order_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Setting        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
