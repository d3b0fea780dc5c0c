use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::Setting;

pub async fn fetch_settings(conn: &mut SqliteConnection) -> Result<Vec<Setting>, sqlx::Error> {
    sqlx::query_as("SELECT key, value FROM settings ORDER BY key").fetch_all(conn).await
}

pub async fn upsert_setting(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
