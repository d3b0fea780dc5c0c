use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Amount, NewOrder, Order, OrderNo},
    traits::StorefrontError,
};

/// Inserts a new `Pending` order with a zero total. The total and coupon are filled in by [`set_order_pricing`] once
/// they have been validated inside the same transaction. Inserting first means the transaction takes the write lock
/// before it reads anything.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorefrontError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_no,
                contact,
                product_id,
                quantity,
                total_amount,
                payment_method,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, 0, $5, 'Pending', $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_no.as_str())
    .bind(order.contact.as_str())
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(order.payment_method.as_str())
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted with id {}", order.order_no, order.id);
    Ok(order)
}

pub async fn set_order_pricing(
    id: i64,
    total: Amount,
    coupon_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET total_amount = $1, coupon_id = $2 WHERE id = $3 RETURNING *")
        .bind(total)
        .bind(coupon_id)
        .bind(id)
        .fetch_one(conn)
        .await
}

pub async fn fetch_order_by_order_no(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_no = $1").bind(order_no.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Touches the order row so that the surrounding transaction holds the database write lock before it reads the order.
/// Competing writers wait (up to the busy timeout) until this transaction finishes.
pub async fn lock_order_for_update(
    order_no: &OrderNo,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    trace!("🗃️ Locking order [{order_no}]");
    sqlx::query_as("UPDATE orders SET updated_at = $1 WHERE order_no = $2 RETURNING *")
        .bind(now)
        .bind(order_no.as_str())
        .fetch_optional(conn)
        .await
}

/// `Pending -> Paid`. Returns `None` if the order was not `Pending`.
pub async fn mark_order_paid(
    id: i64,
    payment_method: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Paid', paid_at = $1, updated_at = $1, payment_method = $2
            WHERE id = $3 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(payment_method)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// `Pending -> Expired` for a single order. Returns `None` if the order was not `Pending`.
pub async fn expire_order(id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET status = 'Expired', updated_at = $1 WHERE id = $2 AND status = 'Pending' RETURNING *",
    )
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// `Pending -> Expired` for every order created before `cutoff`. Running this concurrently with itself is harmless:
/// an order can only be picked up by the statement that changes it.
pub async fn expire_orders_created_before(
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Expired', updated_at = $1
            WHERE status = 'Pending' AND julianday(created_at) < julianday($2)
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(cutoff)
    .fetch_all(conn)
    .await
}

pub async fn fetch_orders_for_contact(
    contact: &str,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE contact = $1 ORDER BY julianday(created_at) DESC, id DESC LIMIT $2")
        .bind(contact)
        .bind(limit)
        .fetch_all(conn)
        .await
}

/// Returns `true` if the flag changed.
pub async fn mark_email_sent(
    order_no: &OrderNo,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET email_sent = 1, updated_at = $1 WHERE order_no = $2 AND email_sent = 0")
        .bind(now)
        .bind(order_no.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
