pub mod epay;
mod pricing;

pub use epay::{
    payment_url,
    verify_signature,
    CallbackError,
    DEFAULT_CHANNEL,
    GatewayConfig,
    PaymentRequest,
    SignScheme,
    SignatureError,
    VerifiedCallback,
};
pub use pricing::{
    check_coupon,
    check_discount_definition,
    generate_coupon_code,
    order_total,
    CouponError,
    Discount,
    DEFAULT_COUPON_LENGTH,
    MAX_BULK_COUPONS,
    MAX_ORDER_QUANTITY,
};
