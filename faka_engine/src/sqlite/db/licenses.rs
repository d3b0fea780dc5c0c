use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::License;

/// Inserts the codes as `Available` units of the product. All units of a batch share `created_at`; the row id breaks
/// the tie, so the batch order is kept for FIFO allocation.
pub async fn insert_licenses(
    product_id: i64,
    codes: &[String],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<License>, sqlx::Error> {
    let mut result = Vec::with_capacity(codes.len());
    for code in codes {
        let license: License = sqlx::query_as(
            r#"
                INSERT INTO licenses (product_id, code, status, created_at, updated_at)
                VALUES ($1, $2, 'Available', $3, $3)
                RETURNING *;
            "#,
        )
        .bind(product_id)
        .bind(code.as_str())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        result.push(license);
    }
    debug!("🗃️ {} licenses added to product #{product_id}", result.len());
    Ok(result)
}

pub async fn count_available(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM licenses WHERE product_id = $1 AND status = 'Available'")
        .bind(product_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// The ids of the `quantity` oldest available units of the product. May return fewer than `quantity`.
pub async fn oldest_available(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            SELECT id FROM licenses
            WHERE product_id = $1 AND status = 'Available'
            ORDER BY julianday(created_at) ASC, id ASC
            LIMIT $2;
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_all(conn)
    .await
}

/// Flips the given units from `Available` to `Sold` for the order. Units that are no longer available are skipped, so
/// the caller must compare the returned count with the number of ids.
pub async fn mark_sold(
    ids: &[i64],
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE licenses SET status = 'Sold', order_id = ");
    builder.push_bind(order_id);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE status = 'Available' AND id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    trace!("🗃️ {} of {} licenses marked as sold to order #{order_id}", result.rows_affected(), ids.len());
    Ok(result.rows_affected())
}

/// Stores a unit that is sold the moment it is created, i.e. the descriptor of a provisioned account.
pub async fn insert_sold_license(
    product_id: i64,
    code: &str,
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<License, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO licenses (product_id, code, status, order_id, created_at, updated_at)
            VALUES ($1, $2, 'Sold', $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(code)
    .bind(order_id)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_licenses_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<License>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM licenses WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Available units of a product, newest first.
pub async fn fetch_available_licenses(
    product_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<License>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM licenses
            WHERE product_id = $1 AND status = 'Available'
            ORDER BY julianday(created_at) DESC, id DESC
            LIMIT $2;
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(conn)
    .await
}
