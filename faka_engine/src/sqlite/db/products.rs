use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Category, NewProduct, Product, ProductKind, ProductKindType};

pub async fn insert_category(name: &str, conn: &mut SqliteConnection) -> Result<Category, sqlx::Error> {
    let category: Category =
        sqlx::query_as("INSERT INTO categories (name, created_at) VALUES ($1, $2) RETURNING id, name")
            .bind(name)
            .bind(Utc::now())
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Category '{}' inserted with id {}", category.name, category.id);
    Ok(category)
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let (kind, hours) = match product.kind {
        ProductKind::Standard => (ProductKindType::Standard, None),
        ProductKind::Provisioned { duration } => (ProductKindType::Provisioned, duration.map(|d| d.num_hours())),
    };
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (name, price, category_id, kind, provision_hours, delivery_format, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.category_id)
    .bind(kind)
    .bind(hours)
    .bind(product.delivery_format)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product '{}' inserted with id {}", product.name, product.id);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}
