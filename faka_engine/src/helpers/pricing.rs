//! Coupon rules and order pricing.
//!
//! These are pure functions. The database backend calls them inside the order-creation transaction, and the coupon
//! API calls them for the storefront's "check my code" button, so both give the same answer.
use rand::{seq::SliceRandom, thread_rng};
use serde::Serialize;
use thiserror::Error;

use crate::db_types::{Amount, Coupon, CouponScope, DiscountType, Product};

pub const COUPON_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const DEFAULT_COUPON_LENGTH: usize = 8;
pub const MAX_BULK_COUPONS: usize = 500;
/// The most units a single order may ask for.
pub const MAX_ORDER_QUANTITY: i64 = 1_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Coupon {0} does not exist")]
    NotFound(String),
    #[error("Coupon {0} has already been used")]
    AlreadyUsed(String),
    #[error("Coupon {0} is not valid for this product")]
    WrongProduct(String),
    #[error("Coupon {0} is not valid for this product category")]
    WrongCategory(String),
    #[error("Invalid coupon definition: {0}")]
    InvalidDefinition(String),
}

/// A discount that has passed validation against a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "discountType", content = "discountValue")]
pub enum Discount {
    /// A flat amount off the subtotal.
    #[serde(rename = "FIXED")]
    Fixed(Amount),
    /// Whole percent off the subtotal.
    #[serde(rename = "PERCENTAGE")]
    Percentage(i64),
}

impl Discount {
    pub fn from_coupon(coupon: &Coupon) -> Self {
        match coupon.discount_type {
            DiscountType::Fixed => Discount::Fixed(Amount::from(coupon.discount_value)),
            DiscountType::Percentage => Discount::Percentage(coupon.discount_value),
        }
    }

    /// The amount taken off `subtotal`. Never more than the subtotal itself.
    pub fn amount_off(&self, subtotal: Amount) -> Amount {
        let off = match self {
            Discount::Fixed(amount) => *amount,
            Discount::Percentage(percent) => subtotal.basis_points(percent.saturating_mul(100)).unwrap_or(subtotal),
        };
        off.max(Amount::default()).min(subtotal)
    }
}

/// `max(0, unit_price * quantity - discount)`, or `None` if the subtotal does not fit in an [`Amount`].
pub fn order_total(unit_price: Amount, quantity: i64, discount: Option<&Discount>) -> Option<Amount> {
    let subtotal = unit_price.checked_mul(quantity)?;
    let total = match discount {
        Some(d) => subtotal.saturating_sub_to_zero(d.amount_off(subtotal)),
        None => subtotal.max(Amount::default()),
    };
    Some(total)
}

/// Applies the coupon checks in order: not already used, then scope. Existence is the caller's concern since it
/// requires a lookup.
pub fn check_coupon(coupon: &Coupon, product: &Product) -> Result<Discount, CouponError> {
    if coupon.used {
        return Err(CouponError::AlreadyUsed(coupon.code.clone()));
    }
    match coupon.scope() {
        CouponScope::Product(id) if id != product.id => Err(CouponError::WrongProduct(coupon.code.clone())),
        CouponScope::Category(id) if product.category_id != Some(id) => {
            Err(CouponError::WrongCategory(coupon.code.clone()))
        },
        _ => Ok(Discount::from_coupon(coupon)),
    }
}

/// Validates the numbers of a coupon before it is stored.
pub fn check_discount_definition(discount_type: DiscountType, value: i64) -> Result<(), CouponError> {
    match discount_type {
        DiscountType::Fixed if value <= 0 => {
            Err(CouponError::InvalidDefinition("A fixed discount must be positive".into()))
        },
        DiscountType::Percentage if !(1..=100).contains(&value) => {
            Err(CouponError::InvalidDefinition("A percentage discount must be between 1 and 100".into()))
        },
        _ => Ok(()),
    }
}

/// A random coupon code drawn from an alphabet without look-alike characters, optionally prefixed as `PREFIX-CODE`.
pub fn generate_coupon_code(prefix: Option<&str>, length: usize) -> String {
    let mut rng = thread_rng();
    let code = (0..length)
        .map(|_| COUPON_ALPHABET.choose(&mut rng).copied().map(char::from).unwrap_or('X'))
        .collect::<String>();
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("{}-{code}", p.to_uppercase()),
        None => code,
    }
}
