use crate::{
    db_types::{Coupon, NewCoupon},
    traits::StorefrontError,
};

/// Storage for coupons. Codes are normalised to upper case before they reach these methods.
#[allow(async_fn_in_trait)]
pub trait CouponManagement {
    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, StorefrontError>;

    /// Stores a single coupon. Fails with [`StorefrontError::CouponAlreadyExists`] if the code is taken.
    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, StorefrontError>;

    /// Stores a batch of coupons atomically. Either all of them are stored or none are.
    async fn insert_coupons(&self, coupons: Vec<NewCoupon>) -> Result<Vec<Coupon>, StorefrontError>;

    /// The most recently created coupons, newest first.
    async fn fetch_coupons(&self, limit: i64) -> Result<Vec<Coupon>, StorefrontError>;
}
