use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Coupon, NewCoupon};

pub async fn fetch_coupon_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons WHERE code = $1").bind(code).fetch_optional(conn).await
}

pub async fn insert_coupon(coupon: &NewCoupon, conn: &mut SqliteConnection) -> Result<Coupon, sqlx::Error> {
    let coupon: Coupon = sqlx::query_as(
        r#"
            INSERT INTO coupons (code, discount_type, discount_value, product_id, category_id, used, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *;
        "#,
    )
    .bind(coupon.code.as_str())
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.scope.product_id())
    .bind(coupon.scope.category_id())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Coupon {} inserted with id {}", coupon.code, coupon.id);
    Ok(coupon)
}

/// Marks the coupon as used by the order. Returns `false` if somebody else got there first.
pub async fn consume_coupon(coupon_id: i64, order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE coupons SET used = 1, order_id = $1 WHERE id = $2 AND used = 0")
        .bind(order_id)
        .bind(coupon_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_coupons(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons ORDER BY id DESC LIMIT $1").bind(limit).fetch_all(conn).await
}
