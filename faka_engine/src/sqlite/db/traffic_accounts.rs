use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::TrafficAccount, traits::ProvisionedCredentials};

pub async fn insert_traffic_account(
    credentials: &ProvisionedCredentials,
    order_id: i64,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<TrafficAccount, sqlx::Error> {
    let account: TrafficAccount = sqlx::query_as(
        r#"
            INSERT INTO traffic_accounts (username, password, order_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(credentials.username.as_str())
    .bind(credentials.password.as_str())
    .bind(order_id)
    .bind(expires_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Traffic account {} recorded for order #{order_id}", account.username);
    Ok(account)
}

pub async fn fetch_by_username(username: &str, conn: &mut SqliteConnection) -> Result<Option<TrafficAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM traffic_accounts WHERE username = $1").bind(username).fetch_optional(conn).await
}

pub async fn fetch_expired(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<TrafficAccount>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM traffic_accounts
            WHERE expires_at IS NOT NULL AND julianday(expires_at) < julianday($1)
            ORDER BY id ASC;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await
}

pub async fn delete_traffic_account(id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM traffic_accounts WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected())
}
