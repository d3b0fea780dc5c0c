use std::{collections::HashSet, fmt::Debug};

use log::*;

use crate::{
    db_types::{normalize_coupon_code, Coupon, NewCoupon},
    helpers::{check_coupon, check_discount_definition, generate_coupon_code, CouponError, MAX_BULK_COUPONS},
    store_api::order_objects::{coupon_scope, BulkCouponRequest, CouponCheck, CouponRequest},
    traits::{CouponManagement, StorefrontDatabase, StorefrontError},
};

const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 32;
/// Generated batches that collide with existing codes are regenerated this many times before giving up.
const BULK_ATTEMPTS: usize = 3;

pub struct CouponApi<B> {
    db: B,
}

impl<B: Debug> Debug for CouponApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CouponApi ({:?})", self.db)
    }
}

impl<B> CouponApi<B>
where B: CouponManagement + StorefrontDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Checks a coupon against a product without consuming it. The checks are the same ones that are applied at
    /// checkout: the code exists, it is unused, and its scope covers the product.
    pub async fn validate(&self, code: &str, product_id: i64) -> Result<CouponCheck, StorefrontError> {
        let code = normalize_coupon_code(code);
        let product = self.db.fetch_product(product_id).await?.ok_or(StorefrontError::ProductNotFound(product_id))?;
        let coupon = self.db.fetch_coupon(&code).await?.ok_or_else(|| CouponError::NotFound(code.clone()))?;
        let discount = check_coupon(&coupon, &product)?;
        trace!("🎟️ Coupon {code} is valid for product #{product_id}");
        Ok(CouponCheck::new(coupon.code, discount))
    }

    pub async fn create(&self, request: CouponRequest) -> Result<Coupon, StorefrontError> {
        let code = normalize_coupon_code(&request.code);
        if code.is_empty() {
            return Err(StorefrontError::InvalidInput("A coupon code is required".into()));
        }
        check_discount_definition(request.discount_type, request.discount_value)?;
        let scope = coupon_scope(request.product_id, request.category_id).ok_or_else(|| {
            StorefrontError::InvalidInput("A coupon can be bound to a product or a category, not both".into())
        })?;
        let coupon = NewCoupon {
            code,
            discount_type: request.discount_type,
            discount_value: request.discount_value,
            scope,
        };
        let coupon = self.db.insert_coupon(coupon).await?;
        info!("🎟️ Coupon {} created", coupon.code);
        Ok(coupon)
    }

    /// Generates `count` random coupons with the same discount. The batch is stored atomically.
    pub async fn bulk_generate(&self, request: BulkCouponRequest) -> Result<Vec<Coupon>, StorefrontError> {
        if request.count == 0 || request.count > MAX_BULK_COUPONS {
            return Err(StorefrontError::InvalidInput(format!(
                "Between 1 and {MAX_BULK_COUPONS} coupons can be generated at a time"
            )));
        }
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&request.length) {
            return Err(StorefrontError::InvalidInput(format!(
                "Coupon codes must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH} characters long"
            )));
        }
        check_discount_definition(request.discount_type, request.discount_value)?;
        let scope = coupon_scope(request.product_id, request.category_id).ok_or_else(|| {
            StorefrontError::InvalidInput("A coupon can be bound to a product or a category, not both".into())
        })?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut codes = HashSet::with_capacity(request.count);
            while codes.len() < request.count {
                codes.insert(generate_coupon_code(request.prefix.as_deref(), request.length));
            }
            let batch = codes
                .into_iter()
                .map(|code| NewCoupon {
                    code,
                    discount_type: request.discount_type,
                    discount_value: request.discount_value,
                    scope,
                })
                .collect();
            match self.db.insert_coupons(batch).await {
                Ok(coupons) => {
                    info!("🎟️ Generated {} coupons", coupons.len());
                    return Ok(coupons);
                },
                Err(StorefrontError::CouponAlreadyExists(code)) if attempt < BULK_ATTEMPTS => {
                    debug!("🎟️ Generated code {code} is already taken. Generating a fresh batch.");
                },
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Coupon>, StorefrontError> {
        self.db.fetch_coupons(limit).await
    }
}
